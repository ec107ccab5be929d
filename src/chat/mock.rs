//! Mock Chat Client for Testing
//!
//! Records every outbound platform call and feeds queued inbound events,
//! so the whole bot can be exercised without a real chat platform.

use super::traits::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock chat client for tests.
#[derive(Clone)]
pub struct MockChatClient {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_message_id: i64,
    /// Live messages by (chat, id); deleted messages are removed.
    messages: HashMap<(ChatId, MessageId), String>,
    sent: Vec<SentMessage>,
    edits: Vec<(ChatId, MessageId, String)>,
    deleted: Vec<(ChatId, MessageId)>,
    pinned: Vec<(ChatId, MessageId, bool)>,
    banned: Vec<(ChatId, UserId)>,
    unbanned: Vec<(ChatId, UserId, bool)>,
    queued_events: Vec<ChatEvent>,
    fail_network: bool,
}

/// A message the mock "sent".
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat: ChatId,
    pub id: MessageId,
    pub text: String,
    pub options: SendOptions,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Queue an inbound event for the next `next_events` call.
    pub fn queue_event(&self, event: ChatEvent) {
        self.state.lock().unwrap().queued_events.push(event);
    }

    /// Make every network call fail until cleared.
    pub fn set_fail_network(&self, fail: bool) {
        self.state.lock().unwrap().fail_network = fail;
    }

    /// All messages sent so far, for assertions.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Texts of messages sent to one chat.
    pub fn sent_texts(&self, chat: ChatId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|m| m.chat == chat)
            .map(|m| m.text.clone())
            .collect()
    }

    /// Current text of a live message, if it exists.
    pub fn message_text(&self, chat: ChatId, message: MessageId) -> Option<String> {
        self.state.lock().unwrap().messages.get(&(chat, message)).cloned()
    }

    pub fn edits(&self) -> Vec<(ChatId, MessageId, String)> {
        self.state.lock().unwrap().edits.clone()
    }

    pub fn deleted(&self) -> Vec<(ChatId, MessageId)> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn pins(&self) -> Vec<(ChatId, MessageId, bool)> {
        self.state.lock().unwrap().pinned.clone()
    }

    pub fn banned(&self) -> Vec<(ChatId, UserId)> {
        self.state.lock().unwrap().banned.clone()
    }

    pub fn unbanned(&self) -> Vec<(ChatId, UserId, bool)> {
        self.state.lock().unwrap().unbanned.clone()
    }

    /// Clear all recorded state.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        *state = MockState::default();
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        options: SendOptions,
    ) -> ChatResult<MessageId> {
        let mut state = self.state.lock().unwrap();
        if state.fail_network {
            return Err(ChatError::Network("simulated send failure".to_string()));
        }
        state.next_message_id += 1;
        let id = MessageId(state.next_message_id);
        state.messages.insert((chat, id), text.to_string());
        state.sent.push(SentMessage {
            chat,
            id,
            text: text.to_string(),
            options,
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        _options: SendOptions,
    ) -> ChatResult<EditOutcome> {
        let mut state = self.state.lock().unwrap();
        if state.fail_network {
            return Err(ChatError::Network("simulated edit failure".to_string()));
        }
        let existing = state
            .messages
            .get(&(chat, message))
            .ok_or_else(|| ChatError::NotFound(format!("message {message} in chat {chat}")))?;
        if existing == text {
            return Ok(EditOutcome::Unchanged);
        }
        state.messages.insert((chat, message), text.to_string());
        state.edits.push((chat, message, text.to_string()));
        Ok(EditOutcome::Edited)
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_network {
            return Err(ChatError::Network("simulated delete failure".to_string()));
        }
        if state.messages.remove(&(chat, message)).is_none() {
            return Err(ChatError::NotFound(format!(
                "message {message} in chat {chat}"
            )));
        }
        state.deleted.push((chat, message));
        Ok(())
    }

    async fn pin_message(&self, chat: ChatId, message: MessageId, silent: bool) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_network {
            return Err(ChatError::Network("simulated pin failure".to_string()));
        }
        if !state.messages.contains_key(&(chat, message)) {
            return Err(ChatError::NotFound(format!(
                "message {message} in chat {chat}"
            )));
        }
        state.pinned.push((chat, message, silent));
        Ok(())
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_network {
            return Err(ChatError::Network("simulated ban failure".to_string()));
        }
        state.banned.push((chat, user));
        Ok(())
    }

    async fn unban_member(
        &self,
        chat: ChatId,
        user: UserId,
        only_if_banned: bool,
    ) -> ChatResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_network {
            return Err(ChatError::Network("simulated unban failure".to_string()));
        }
        state.unbanned.push((chat, user, only_if_banned));
        Ok(())
    }

    async fn next_events(&self) -> ChatResult<Vec<ChatEvent>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_network {
            return Err(ChatError::Network("simulated receive failure".to_string()));
        }
        Ok(state.queued_events.drain(..).collect())
    }
}
