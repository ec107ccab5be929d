//! Membership Gate
//!
//! Drives the onboarding lifecycle for every new member:
//!
//! ```text
//! join -> Unverified --(tag message)--> Resolved
//!             |
//!         warn_delay
//!             v
//!          Warned ----(tag message)---> Resolved
//!             |
//!         kick_delay
//!             v
//!          Kicked (banned then unbanned, messages cleaned up)
//! ```
//!
//! At most one gate job is live per member; every transition cancels before
//! it reschedules. The pending flag is the commit point: identify clears it
//! before anything else, so a duplicate tag, a fired timer, and an admin
//! override can never double-settle one member. The cancel itself is cleanup;
//! a member whose welcome send failed has the flag but no timer, and still
//! settles normally.

use crate::chat::{text, ChatClient, ChatId, ChatResult, ChatUser, SendOptions, UserId};
use crate::jobs::{cancel_gate, GateScheduler, GateStage, JobKey, JobPayload};
use crate::scheduler::When;
use crate::store::{MessageKind, StateStore};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gate policy knobs. Delays are configuration, not constants; the 90m/30m
/// defaults mirror the deployed policy.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub warn_delay: Duration,
    pub kick_delay: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            warn_delay: Duration::from_secs(90 * 60),
            kick_delay: Duration::from_secs(30 * 60),
        }
    }
}

/// Per-member onboarding state machine.
pub struct MembershipGate<C: ChatClient> {
    client: C,
    scheduler: GateScheduler,
    store: StateStore,
    config: GateConfig,
}

impl<C: ChatClient> MembershipGate<C> {
    pub fn new(client: C, scheduler: GateScheduler, store: StateStore, config: GateConfig) -> Self {
        Self {
            client,
            scheduler,
            store,
            config,
        }
    }

    /// Welcome each non-bot joiner and arm their warn timer.
    pub async fn on_join(&self, chat: ChatId, members: &[ChatUser]) -> ChatResult<()> {
        for member in members {
            if member.is_bot {
                debug!(%chat, user = %member.id, "ignoring joining bot account");
                continue;
            }

            self.store.mark_pending(member.id);
            let name = text::display_name(&member.first_name, member.last_name.as_deref());
            self.store
                .record_member(chat, member.id, &name, member.handle.as_deref());

            let welcome = text::welcome(&text::mention(member.id, &name));
            let message_id = self
                .client
                .send_message(chat, &welcome, SendOptions::html())
                .await?;

            // Re-validate: an identify or admin action may have landed while
            // the send was in flight.
            if !self.store.is_pending(member.id) {
                debug!(%chat, user = %member.id, "member settled during welcome send");
                continue;
            }
            self.store
                .set_gate_message(chat, MessageKind::Welcome, member.id, message_id);

            if cancel_gate(&self.scheduler, chat, member.id) {
                warn!(%chat, user = %member.id, "stale gate job found on join, removed");
            }
            self.scheduler.schedule(
                JobKey::Gate {
                    chat,
                    user: member.id,
                    stage: GateStage::Warn,
                },
                When::Once(self.config.warn_delay),
                JobPayload::IdleWarn {
                    chat,
                    user: member.id,
                },
            );
            info!(%chat, user = %member.id, "member gated, warn timer armed");
        }
        Ok(())
    }

    /// A recognized introduction tag arrived from `sender`.
    ///
    /// Only the first matching message wins: the pending flag is cleared up
    /// front, so later duplicates no-op at the guard.
    pub async fn on_identify(&self, chat: ChatId, sender: &ChatUser) -> ChatResult<()> {
        if !self.store.is_pending(sender.id) {
            return Ok(());
        }
        self.store.clear_pending(sender.id);
        if !cancel_gate(&self.scheduler, chat, sender.id) {
            // No live timer, e.g. the welcome send failed after the flag
            // was set. The member still settles.
            debug!(%chat, user = %sender.id, "identify with no live gate timer");
        }
        self.discard_message_refs(chat, sender.id);

        let name = self
            .store
            .display_name(chat, sender.id)
            .unwrap_or_else(|| {
                text::display_name(&sender.first_name, sender.last_name.as_deref())
            });
        let reply = text::identified(&text::mention(sender.id, &name));
        self.client
            .send_message(chat, &reply, SendOptions::html())
            .await?;
        info!(%chat, user = %sender.id, "member identified, gate resolved");
        Ok(())
    }

    /// Warn-stage timer fired: nag the member and arm the kick timer.
    pub async fn on_idle_warn(&self, chat: ChatId, user: UserId) -> ChatResult<()> {
        if !self.store.is_pending(user) {
            debug!(%chat, %user, "warn fired for settled member, ignoring");
            return Ok(());
        }

        let mention = self.mention_for(chat, user);
        let message_id = self
            .client
            .send_message(chat, &text::idle_warning(&mention), SendOptions::html())
            .await?;
        self.store
            .set_gate_message(chat, MessageKind::Warn, user, message_id);

        cancel_gate(&self.scheduler, chat, user);
        self.scheduler.schedule(
            JobKey::Gate {
                chat,
                user,
                stage: GateStage::Kick,
            },
            When::Once(self.config.kick_delay),
            JobPayload::IdleKick { chat, user },
        );
        info!(%chat, %user, "member warned, kick timer armed");
        Ok(())
    }

    /// Kick-stage timer fired: eject the member and clean up after them.
    pub async fn on_idle_kick(&self, chat: ChatId, user: UserId) -> ChatResult<()> {
        if !self.store.is_pending(user) {
            debug!(%chat, %user, "kick fired for settled member, ignoring");
            return Ok(());
        }

        let mention = self.mention_for(chat, user);
        self.client
            .send_message(chat, &text::kicked(&mention), SendOptions::html())
            .await?;
        self.eject(chat, user).await
    }

    /// Ban-then-unban plus full cleanup. Shared with the admin forced kick.
    pub(crate) async fn eject(&self, chat: ChatId, user: UserId) -> ChatResult<()> {
        self.client.ban_member(chat, user).await?;
        self.client.unban_member(chat, user, true).await?;
        self.clean_up_messages(chat, user).await;
        self.store.forget_member(chat, user);
        info!(%chat, %user, "member ejected, bookkeeping cleared");
        Ok(())
    }

    /// Best-effort deletion of the welcome and warn messages. Absence is
    /// logged, never fatal.
    pub(crate) async fn clean_up_messages(&self, chat: ChatId, user: UserId) {
        for kind in [MessageKind::Welcome, MessageKind::Warn] {
            match self.store.take_gate_message(chat, kind, user) {
                Some(message_id) => {
                    if let Err(e) = self.client.delete_message(chat, message_id).await {
                        warn!(%chat, %user, ?kind, error = %e, "gate message cleanup failed");
                    }
                }
                None => warn!(%chat, %user, ?kind, "gate message not found during cleanup"),
            }
        }
    }

    /// Drop recorded gate message refs without touching the chat history.
    /// Used on resolve paths that leave the welcome visible; the refs must
    /// not outlive the member's gate state.
    pub(crate) fn discard_message_refs(&self, chat: ChatId, user: UserId) {
        for kind in [MessageKind::Welcome, MessageKind::Warn] {
            self.store.take_gate_message(chat, kind, user);
        }
    }

    pub(crate) fn store(&self) -> &StateStore {
        &self.store
    }

    pub(crate) fn scheduler(&self) -> &GateScheduler {
        &self.scheduler
    }

    pub(crate) fn mention_for(&self, chat: ChatId, user: UserId) -> String {
        let name = self
            .store
            .display_name(chat, user)
            .unwrap_or_else(|| "member".to_string());
        text::mention(user, &name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MockChatClient;

    fn gate() -> (MembershipGate<MockChatClient>, MockChatClient, StateStore) {
        let client = MockChatClient::new();
        let store = StateStore::in_memory();
        let gate = MembershipGate::new(
            client.clone(),
            GateScheduler::new(),
            store.clone(),
            GateConfig::default(),
        );
        (gate, client, store)
    }

    #[tokio::test]
    async fn join_welcomes_and_arms_warn_timer() {
        let (gate, client, store) = gate();
        let chat = ChatId(1);
        let member = ChatUser::new(UserId(7), "Ada").with_handle("ada");

        gate.on_join(chat, std::slice::from_ref(&member)).await.unwrap();

        let sent = client.sent_texts(chat);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Welcome"));
        assert!(store.is_pending(UserId(7)));
        assert_eq!(
            gate.scheduler.pending(&JobKey::Gate {
                chat,
                user: UserId(7),
                stage: GateStage::Warn
            }),
            1
        );
    }

    #[tokio::test]
    async fn joining_bot_is_ignored() {
        let (gate, client, store) = gate();
        let chat = ChatId(1);
        let bot = ChatUser::new(UserId(8), "Botty").bot();

        gate.on_join(chat, &[bot]).await.unwrap();

        assert!(client.sent_messages().is_empty());
        assert!(!store.is_pending(UserId(8)));
        assert!(gate.scheduler.is_empty());
    }

    #[tokio::test]
    async fn second_identify_is_a_noop() {
        let (gate, client, _store) = gate();
        let chat = ChatId(1);
        let member = ChatUser::new(UserId(7), "Ada");

        gate.on_join(chat, std::slice::from_ref(&member)).await.unwrap();
        gate.on_identify(chat, &member).await.unwrap();
        gate.on_identify(chat, &member).await.unwrap();

        // One welcome plus exactly one confirmation.
        assert_eq!(client.sent_texts(chat).len(), 2);
    }

    #[tokio::test]
    async fn identify_without_join_is_ignored() {
        let (gate, client, _store) = gate();
        let outsider = ChatUser::new(UserId(9), "Old Timer");

        gate.on_identify(ChatId(1), &outsider).await.unwrap();
        assert!(client.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn warn_for_settled_member_is_ignored() {
        let (gate, client, _store) = gate();
        let chat = ChatId(1);
        let member = ChatUser::new(UserId(7), "Ada");

        gate.on_join(chat, std::slice::from_ref(&member)).await.unwrap();
        gate.on_identify(chat, &member).await.unwrap();
        client.clear();

        gate.on_idle_warn(chat, UserId(7)).await.unwrap();
        assert!(client.sent_messages().is_empty());
        assert!(gate.scheduler.is_empty());
    }

    #[tokio::test]
    async fn identify_settles_member_even_without_a_timer() {
        let (gate, client, store) = gate();
        let chat = ChatId(1);
        let member = ChatUser::new(UserId(7), "Ada");

        client.set_fail_network(true);
        assert!(gate
            .on_join(chat, std::slice::from_ref(&member))
            .await
            .is_err());
        assert!(store.is_pending(UserId(7)), "flag set before the send");
        assert!(gate.scheduler.is_empty(), "no timer survived the failure");

        client.set_fail_network(false);
        gate.on_identify(chat, &member).await.unwrap();

        assert!(!store.is_pending(UserId(7)));
        let sent = client.sent_texts(chat);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("Thanks"));
    }

    #[tokio::test]
    async fn identify_discards_recorded_gate_messages() {
        let (gate, _client, store) = gate();
        let chat = ChatId(1);
        let member = ChatUser::new(UserId(7), "Ada");

        gate.on_join(chat, std::slice::from_ref(&member)).await.unwrap();
        gate.on_identify(chat, &member).await.unwrap();

        assert_eq!(
            store.take_gate_message(chat, MessageKind::Welcome, UserId(7)),
            None,
            "welcome ref must not outlive the gate state"
        );
    }
}
