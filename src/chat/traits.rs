//! Chat Platform Trait Abstractions
//!
//! The platform transport (long polling, webhooks, whatever the deployment
//! uses) lives outside this crate. Everything here talks to the platform
//! through `ChatClient`, which lets `MockChatClient` stand in for the real
//! thing in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric chat identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user as reported by the platform in inbound events.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatUser {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Textual handle without the leading `@`, when the platform exposes one.
    pub handle: Option<String>,
    pub is_bot: bool,
}

impl ChatUser {
    pub fn new(id: UserId, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: None,
            handle: None,
            is_bot: false,
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }
}

/// Inbound chat events the dispatcher hands to the bot.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// One or more members joined a chat (platforms batch these).
    MembersJoined {
        chat: ChatId,
        members: Vec<ChatUser>,
    },
    /// A text message, commands included.
    Text {
        chat: ChatId,
        sender: ChatUser,
        message_id: MessageId,
        text: String,
    },
}

/// Rich-text mode for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

/// Per-message send/edit options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub format: TextFormat,
    pub link_preview: bool,
}

impl SendOptions {
    pub fn plain() -> Self {
        Self {
            format: TextFormat::Plain,
            link_preview: true,
        }
    }

    pub fn html() -> Self {
        Self {
            format: TextFormat::Html,
            link_preview: true,
        }
    }

    pub fn without_preview(mut self) -> Self {
        self.link_preview = false;
        self
    }
}

/// Outcome of an in-place edit.
///
/// "Content identical" is a normal outcome, not an error: callers treat
/// `Unchanged` as success and must not resend or re-pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    Unchanged,
}

/// Result type for chat platform operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat platform errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Chat platform client abstraction.
///
/// Implementations are cheap to clone (shared handles internally). All
/// methods are suspension points: state read before an await must be
/// re-validated afterwards by the caller.
#[async_trait]
pub trait ChatClient: Clone + Send + Sync + 'static {
    /// Send a message, returning the platform-assigned id.
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        options: SendOptions,
    ) -> ChatResult<MessageId>;

    /// Edit a message in place.
    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        options: SendOptions,
    ) -> ChatResult<EditOutcome>;

    /// Delete a message. `NotFound` when it no longer exists.
    async fn delete_message(&self, chat: ChatId, message: MessageId) -> ChatResult<()>;

    /// Pin a message, optionally without notifying the chat.
    async fn pin_message(&self, chat: ChatId, message: MessageId, silent: bool) -> ChatResult<()>;

    /// Ban a member from a chat.
    async fn ban_member(&self, chat: ChatId, user: UserId) -> ChatResult<()>;

    /// Lift a ban. With `only_if_banned` the call is a no-op for members in
    /// good standing (used to eject without a permanent ban).
    async fn unban_member(&self, chat: ChatId, user: UserId, only_if_banned: bool)
        -> ChatResult<()>;

    /// Fetch the next batch of inbound events (empty when idle).
    async fn next_events(&self) -> ChatResult<Vec<ChatEvent>>;
}
