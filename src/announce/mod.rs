//! Event Announcement Module
//!
//! Keeps one pinned, periodically refreshed summary of upcoming events per
//! chat, backed by a daily-refresh cache over an external `EventSource`.

pub mod cache;
pub mod events;

pub use cache::{AnnounceError, Announcer};
pub use events::{CacheSnapshot, Event, EventSource, EventSourceError, MockEventSource};
