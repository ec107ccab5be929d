//! Chat Platform Integration Module
//!
//! The bot never talks to a concrete chat platform directly; everything
//! goes through the `ChatClient` trait so the deployment supplies the
//! transport and tests supply `MockChatClient`.

pub mod mock;
pub mod text;
pub mod traits;

pub use mock::MockChatClient;
pub use traits::{
    ChatClient, ChatError, ChatEvent, ChatId, ChatResult, ChatUser, EditOutcome, MessageId,
    SendOptions, TextFormat, UserId,
};
