//! Administrator shortcuts through the membership gate.
//!
//! Both commands resolve their target through the reverse handle map
//! recorded at join time, reject non-administrators outright, and converge
//! with the gate's natural terminal transitions.

use super::gate::MembershipGate;
use crate::chat::{text, ChatClient, ChatId, ChatResult, ChatUser, SendOptions, UserId};
use crate::jobs::cancel_gate;
use tracing::info;

/// Administrator-only actions. Holds the gate itself so cleanup is shared
/// with the natural transitions rather than reimplemented.
pub struct AdminActions<C: ChatClient> {
    client: C,
    gate: MembershipGate<C>,
    admin: UserId,
}

impl<C: ChatClient> AdminActions<C> {
    pub fn new(client: C, gate: MembershipGate<C>, admin: UserId) -> Self {
        Self {
            client,
            gate,
            admin,
        }
    }

    pub fn gate(&self) -> &MembershipGate<C> {
        &self.gate
    }

    /// Reject non-admin invokers with a visible reply. True when rejected.
    async fn reject_non_admin(&self, chat: ChatId, invoker: &ChatUser) -> ChatResult<bool> {
        if invoker.id == self.admin {
            return Ok(false);
        }
        self.client
            .send_message(chat, text::ADMIN_ACCESS_DENIED, SendOptions::plain())
            .await?;
        Ok(true)
    }

    /// Resolve `@handle`, replying "not found" on a miss. No mutation on
    /// either failure path.
    async fn resolve_target(&self, chat: ChatId, handle: &str) -> ChatResult<Option<UserId>> {
        match self.gate.store().resolve_handle(chat, handle) {
            Some(user) => Ok(Some(user)),
            None => {
                self.client
                    .send_message(chat, text::USER_NOT_FOUND, SendOptions::plain())
                    .await?;
                Ok(None)
            }
        }
    }

    /// Wave a newcomer through without an introduction: same cleanup and
    /// confirmation as the natural identify path.
    pub async fn guest_list(&self, chat: ChatId, invoker: &ChatUser, handle: &str) -> ChatResult<()> {
        if self.reject_non_admin(chat, invoker).await? {
            return Ok(());
        }
        let Some(user) = self.resolve_target(chat, handle).await? else {
            return Ok(());
        };

        let had_timer = cancel_gate(self.gate.scheduler(), chat, user);
        if !had_timer && !self.gate.store().is_pending(user) {
            // Already resolved; tell the admin rather than silently doing
            // nothing.
            self.client
                .send_message(chat, &text::nothing_pending(handle), SendOptions::plain())
                .await?;
            return Ok(());
        }
        // A pending member with no timer (failed welcome send) settles the
        // same way as one with a live timer.
        self.gate.store().clear_pending(user);

        let mention = self.gate.mention_for(chat, user);
        self.client
            .send_message(chat, &text::guest_listed(&mention), SendOptions::html())
            .await?;
        self.gate.clean_up_messages(chat, user).await;
        self.client
            .send_message(chat, &text::identified(&mention), SendOptions::html())
            .await?;
        info!(%chat, %user, admin = %invoker.id, "member guest-listed");
        Ok(())
    }

    /// Forced removal: cancel whatever is pending, then run the same
    /// eject-and-clean-up path as the natural idle kick.
    pub async fn kick(&self, chat: ChatId, invoker: &ChatUser, handle: &str) -> ChatResult<()> {
        if self.reject_non_admin(chat, invoker).await? {
            return Ok(());
        }
        let Some(user) = self.resolve_target(chat, handle).await? else {
            return Ok(());
        };

        // Idempotent: false just means nothing was pending.
        cancel_gate(self.gate.scheduler(), chat, user);

        let mention = self.gate.mention_for(chat, user);
        self.client
            .send_message(chat, &text::kicked(&mention), SendOptions::html())
            .await?;
        self.gate.eject(chat, user).await?;
        info!(%chat, %user, admin = %invoker.id, "member kicked by admin");
        Ok(())
    }
}
