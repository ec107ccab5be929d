//! Event value type and the `EventSource` collaborator contract.
//!
//! Fetching (scraping, GraphQL, calendar REST) and record persistence live
//! outside this crate; the bot only consumes the ordered list a source
//! yields and forwards `/createevent` submissions.

use crate::chat::ChatId;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// A single upcoming event. Immutable once constructed; ordering within a
/// list is whatever the source returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<String>,
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub location: String,
    pub url: String,
    pub description: String,
}

impl fmt::Display for Event {
    /// One announcement line: `<b>DD.MM</b> - title @ location - link`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<b>{}</b> - {} @ {} - <a href=\"{}\">{}</a>",
            self.start.format("%d.%m"),
            self.title,
            self.location,
            self.url,
            self.url
        )
    }
}

/// Cached event list for one chat, persisted with the chat state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub last_update: DateTime<Utc>,
    pub events: Vec<Event>,
}

/// Event source errors.
#[derive(Debug, thiserror::Error)]
pub enum EventSourceError {
    #[error("event source unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported event url: {0}")]
    UnsupportedUrl(String),

    #[error("event rejected by source: {0}")]
    Rejected(String),
}

/// Contract with the external event platform.
#[async_trait]
pub trait EventSource: Clone + Send + Sync + 'static {
    /// Upcoming events for a chat's region, already sorted by the source.
    async fn fetch_upcoming(&self, chat: ChatId) -> Result<Vec<Event>, EventSourceError>;

    /// Import an event from a URL and persist it on the source's side.
    async fn submit(&self, url: &str) -> Result<Event, EventSourceError>;
}

/// Mock event source for tests.
#[derive(Clone)]
pub struct MockEventSource {
    state: Arc<Mutex<MockSourceState>>,
}

#[derive(Default)]
struct MockSourceState {
    events: Vec<Event>,
    fetches: usize,
    submissions: Vec<String>,
    fail_fetch: bool,
    reject_submissions: bool,
}

impl MockEventSource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockSourceState::default())),
        }
    }

    /// Replace the list served by `fetch_upcoming`.
    pub fn set_events(&self, events: Vec<Event>) {
        self.state.lock().unwrap().events = events;
    }

    /// How many times `fetch_upcoming` was called.
    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    pub fn submissions(&self) -> Vec<String> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_fetch = fail;
    }

    pub fn set_reject_submissions(&self, reject: bool) {
        self.state.lock().unwrap().reject_submissions = reject;
    }

    /// Convenience constructor for a test event on a given day.
    pub fn sample_event(title: &str, start: &str) -> Event {
        let start: DateTime<FixedOffset> = start
            .parse()
            .unwrap_or_else(|_| "2026-06-05T22:00:00+02:00".parse().unwrap());
        Event {
            id: None,
            title: title.to_string(),
            start,
            end: start + chrono::Duration::hours(6),
            location: "Warehouse 9".to_string(),
            url: format!("https://events.example/{}", title.to_lowercase()),
            description: String::new(),
        }
    }
}

impl Default for MockEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn fetch_upcoming(&self, _chat: ChatId) -> Result<Vec<Event>, EventSourceError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(EventSourceError::Unavailable(
                "simulated fetch failure".to_string(),
            ));
        }
        state.fetches += 1;
        Ok(state.events.clone())
    }

    async fn submit(&self, url: &str) -> Result<Event, EventSourceError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_submissions {
            return Err(EventSourceError::Rejected(
                "simulated rejection".to_string(),
            ));
        }
        state.submissions.push(url.to_string());
        drop(state);
        let mut event = Self::sample_event("Submitted", "2026-06-05T22:00:00+02:00");
        event.url = url.to_string();
        Ok(event)
    }
}
