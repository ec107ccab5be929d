//! Typed job keys and payloads for the bot's scheduler.
//!
//! Keys combine chat id, member id, and gate stage so jobs can never collide
//! across chats (stringified-id keys would).

use crate::chat::{ChatId, UserId};
use crate::scheduler::JobScheduler;

/// Scheduler instantiation used throughout the bot.
pub type GateScheduler = JobScheduler<JobKey, JobPayload>;

/// Stage of the membership gate a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateStage {
    Warn,
    Kick,
}

/// Unique key for a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKey {
    /// Pending gate action for one member in one chat.
    Gate {
        chat: ChatId,
        user: UserId,
        stage: GateStage,
    },
    /// Periodic announcement refresh for one chat.
    Announce { chat: ChatId },
}

/// What to do when a job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPayload {
    IdleWarn { chat: ChatId, user: UserId },
    IdleKick { chat: ChatId, user: UserId },
    RefreshAnnouncement { chat: ChatId },
}

/// Cancel whichever gate stage is pending for a member. True iff any was.
///
/// At most one stage is ever live per member, but cancelling both keys keeps
/// this correct even if that invariant is violated elsewhere.
pub fn cancel_gate(scheduler: &GateScheduler, chat: ChatId, user: UserId) -> bool {
    let warn = scheduler.cancel(&JobKey::Gate {
        chat,
        user,
        stage: GateStage::Warn,
    });
    let kick = scheduler.cancel(&JobKey::Gate {
        chat,
        user,
        stage: GateStage::Kick,
    });
    warn || kick
}
