//! Announcement cache and pinned-summary publishing.
//!
//! Each chat keeps one cached event list and one pinned summary message.
//! The cache refreshes at most once per calendar day unless explicitly
//! invalidated; publishing edits the pinned message in place and treats a
//! "content identical" edit as success so an unchanged list costs no
//! visible mutation.

use super::events::{CacheSnapshot, Event, EventSource, EventSourceError};
use crate::chat::{text, ChatClient, ChatError, ChatId, EditOutcome, SendOptions};
use crate::store::StateStore;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Announcement errors.
#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Source(#[from] EventSourceError),
}

/// Per-chat announcement logic over a chat client and an event source.
pub struct Announcer<C: ChatClient, S: EventSource> {
    client: C,
    source: S,
    store: StateStore,
}

impl<C: ChatClient, S: EventSource> Announcer<C, S> {
    pub fn new(client: C, source: S, store: StateStore) -> Self {
        Self {
            client,
            source,
            store,
        }
    }

    /// True when the snapshot cannot serve a read: missing, empty, or a
    /// calendar day (or more) older than `now`.
    fn needs_refresh(snapshot: Option<&CacheSnapshot>, now: DateTime<Utc>) -> bool {
        match snapshot {
            None => true,
            Some(snap) => {
                snap.events.is_empty()
                    || (now.date_naive() - snap.last_update.date_naive()).num_days() >= 1
            }
        }
    }

    /// Cached events for a chat, refreshing from the source first when the
    /// policy requires it.
    pub async fn events(&self, chat: ChatId) -> Result<Vec<Event>, AnnounceError> {
        self.events_at(chat, Utc::now()).await
    }

    pub(crate) async fn events_at(
        &self,
        chat: ChatId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, AnnounceError> {
        let snapshot = self.store.cache_snapshot(chat);
        match snapshot {
            Some(snap) if !Self::needs_refresh(Some(&snap), now) => Ok(snap.events),
            _ => self.refresh_at(chat, now).await,
        }
    }

    /// Unconditionally fetch and replace the cache (explicit invalidation).
    pub async fn refresh(&self, chat: ChatId) -> Result<Vec<Event>, AnnounceError> {
        self.refresh_at(chat, Utc::now()).await
    }

    async fn refresh_at(
        &self,
        chat: ChatId,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, AnnounceError> {
        let events = self.source.fetch_upcoming(chat).await?;
        if events.is_empty() {
            warn!(%chat, "event source returned no upcoming events");
        }
        self.store.replace_cache(
            chat,
            CacheSnapshot {
                last_update: now,
                events: events.clone(),
            },
        );
        debug!(%chat, count = events.len(), "event cache updated");
        Ok(events)
    }

    /// Forward a `/createevent` submission and invalidate the cache so the
    /// next read picks the new event up.
    pub async fn create_event(&self, chat: ChatId, url: &str) -> Result<Event, EventSourceError> {
        let event = self.source.submit(url).await?;
        self.store.clear_cache(chat);
        Ok(event)
    }

    /// Deterministic summary: header, one line per event in source order,
    /// fallback line when there is nothing to announce.
    pub fn render(events: &[Event]) -> String {
        let mut message = String::from(text::UPCOMING_EVENTS_HEADER);
        if events.is_empty() {
            message.push_str(text::NO_UPCOMING_EVENTS);
        } else {
            for event in events {
                message.push_str(&event.to_string());
                message.push('\n');
            }
        }
        message
    }

    /// Publish the current summary, keeping at most one visible
    /// announcement per chat.
    pub async fn publish(&self, chat: ChatId) -> Result<(), AnnounceError> {
        self.publish_at(chat, Utc::now()).await
    }

    pub(crate) async fn publish_at(
        &self,
        chat: ChatId,
        now: DateTime<Utc>,
    ) -> Result<(), AnnounceError> {
        let events = self.events_at(chat, now).await?;
        let message = Self::render(&events);
        self.publish_text(chat, &message).await
    }

    async fn publish_text(&self, chat: ChatId, message: &str) -> Result<(), AnnounceError> {
        let options = SendOptions::html().without_preview();

        if let Some(pinned) = self.store.pinned_announcement(chat) {
            match self.client.edit_message(chat, pinned, message, options).await {
                Ok(EditOutcome::Unchanged) => {
                    debug!(%chat, "announcement unchanged, nothing to do");
                    return Ok(());
                }
                Ok(EditOutcome::Edited) => {
                    // Same message, fresh content; keep it pinned quietly.
                    self.client.pin_message(chat, pinned, true).await?;
                    info!(%chat, %pinned, "announcement updated in place");
                    return Ok(());
                }
                Err(e) => {
                    warn!(%chat, %pinned, error = %e, "editing announcement failed, sending a new one");
                }
            }
        }

        let id = self.client.send_message(chat, message, options).await?;
        self.client.pin_message(chat, id, true).await?;
        self.store.set_pinned_announcement(chat, id);
        info!(%chat, message = %id, "new announcement pinned");
        Ok(())
    }
}
