//! Gatehouse - Group Chat Onboarding Gate
//!
//! A chat bot that gates new members behind a self-introduction ritual and
//! keeps one pinned, periodically refreshed announcement of upcoming events
//! per chat.
//!
//! Key pieces:
//! - Named-job scheduler with cancel-atomic-with-fire semantics
//! - Welcome/warn/kick membership lifecycle built on it
//! - Announcement cache that never re-sends an unchanged summary
//!
//! The chat platform and the event backend are trait seams (`ChatClient`,
//! `EventSource`); the deployment supplies the real transports.

pub mod announce;
pub mod bot;
pub mod chat;
pub mod cli;
pub mod gatekeeper;
pub mod jobs;
pub mod scheduler;
pub mod store;
