//! Gatehouse Bot
//!
//! Single event loop tying everything together: inbound chat events on one
//! side, due scheduler jobs on the other. Handlers run cooperatively; any
//! await is a suspension point, so state is re-validated after network
//! calls (the gate and announcer both do). A failure in one handler or job
//! is logged and isolated; the loop never dies with it.

use crate::announce::{AnnounceError, Announcer, EventSource, EventSourceError};
use crate::chat::{
    text, ChatClient, ChatError, ChatEvent, ChatId, ChatUser, SendOptions, UserId,
};
use crate::gatekeeper::{AdminActions, GateConfig, MembershipGate};
use crate::jobs::{GateScheduler, JobKey, JobPayload};
use crate::scheduler::When;
use crate::store::StateStore;
use regex::Regex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Operator-facing bot settings, usually built from the TOML config.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// The single administrator allowed to use privileged commands.
    pub admin: UserId,
    /// Whole-word, case-insensitive introduction tag.
    pub tag_pattern: Regex,
    pub warn_delay: Duration,
    pub kick_delay: Duration,
    /// Delay before the first run of a `/set` announcement timer.
    pub announce_first: Duration,
    /// Interval between announcement refreshes once `/set`.
    pub announce_interval: Duration,
    /// How often the loop polls the transport for inbound events.
    pub poll_interval: Duration,
}

pub const DEFAULT_TAG_PATTERN: &str = r"(?i)(^|\s)#whois($|\s)";

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            admin: UserId(0),
            tag_pattern: Regex::new(DEFAULT_TAG_PATTERN).expect("default tag pattern is valid"),
            warn_delay: Duration::from_secs(90 * 60),
            kick_delay: Duration::from_secs(30 * 60),
            announce_first: Duration::from_secs(60),
            announce_interval: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Errors surfaced by event and job handlers.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Announce(#[from] AnnounceError),
}

/// Parsed slash command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Events,
    Update,
    Help,
    SetTimer,
    UnsetTimer,
    CreateEvent { url: Option<String> },
    GuestList { handle: Option<String> },
    Kick { handle: Option<String> },
    Unknown(String),
}

/// Parse a slash command out of a text message. `None` for ordinary text.
pub fn parse_command(message: &str) -> Option<Command> {
    let message = message.trim();
    let rest = message.strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();
    // Group chats address commands as /verb@botname.
    let verb = verb.split('@').next().unwrap_or("").to_ascii_lowercase();

    let command = match verb.as_str() {
        "events" => Command::Events,
        "update" => Command::Update,
        "help" => Command::Help,
        "set" => Command::SetTimer,
        "unset" => Command::UnsetTimer,
        "createevent" => Command::CreateEvent {
            url: first_url(args),
        },
        "guestlist" => Command::GuestList {
            handle: first_mention(args),
        },
        "kick" => Command::Kick {
            handle: first_mention(args),
        },
        other => Command::Unknown(other.to_string()),
    };
    Some(command)
}

fn first_mention(args: &str) -> Option<String> {
    args.split_whitespace()
        .find(|word| word.starts_with('@') && word.len() > 1)
        .map(str::to_string)
}

fn first_url(args: &str) -> Option<String> {
    args.split_whitespace()
        .find(|word| word.starts_with("http://") || word.starts_with("https://"))
        .map(str::to_string)
}

/// The bot: shared scheduler, store, and the three handler groups.
pub struct GateBot<C: ChatClient, S: EventSource> {
    client: C,
    admin: AdminActions<C>,
    announcer: Announcer<C, S>,
    scheduler: GateScheduler,
    settings: BotSettings,
}

impl<C: ChatClient, S: EventSource> GateBot<C, S> {
    pub fn new(client: C, source: S, store: StateStore, settings: BotSettings) -> Self {
        let scheduler = GateScheduler::new();
        let gate = MembershipGate::new(
            client.clone(),
            scheduler.clone(),
            store.clone(),
            GateConfig {
                warn_delay: settings.warn_delay,
                kick_delay: settings.kick_delay,
            },
        );
        let admin = AdminActions::new(client.clone(), gate, settings.admin);
        let announcer = Announcer::new(client.clone(), source, store);
        Self {
            client,
            admin,
            announcer,
            scheduler,
            settings,
        }
    }

    /// Scheduler handle, mainly for tests and deployment wiring.
    pub fn scheduler(&self) -> &GateScheduler {
        &self.scheduler
    }

    /// Run the event loop. Transient transport failures are retried on the
    /// next poll; the loop itself never exits.
    pub async fn run(&self) -> Result<(), BotError> {
        let mut poll = tokio::time::interval(self.settings.poll_interval);
        loop {
            let deadline = self.scheduler.next_deadline();
            tokio::select! {
                _ = poll.tick() => {
                    let events = match self.client.next_events().await {
                        Ok(events) => events,
                        Err(e) => {
                            warn!(error = %e, "failed to receive events, will retry");
                            continue;
                        }
                    };
                    for event in events {
                        if let Err(e) = self.handle_event(event).await {
                            // One bad event must not take the loop down.
                            warn!(error = %e, "event handler failed");
                        }
                    }
                }
                _ = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => futures::future::pending().await,
                    }
                } => {
                    self.fire_due_jobs().await;
                }
            }
        }
    }

    /// Drain and dispatch every due job, isolating failures per job.
    pub async fn fire_due_jobs(&self) {
        for (_id, key, payload) in self.scheduler.due(Instant::now()) {
            if let Err(e) = self.dispatch_job(payload).await {
                warn!(job = ?key, error = %e, "scheduled job failed");
            }
        }
    }

    async fn dispatch_job(&self, payload: JobPayload) -> Result<(), BotError> {
        match payload {
            JobPayload::IdleWarn { chat, user } => {
                self.admin.gate().on_idle_warn(chat, user).await?
            }
            JobPayload::IdleKick { chat, user } => {
                self.admin.gate().on_idle_kick(chat, user).await?
            }
            JobPayload::RefreshAnnouncement { chat } => {
                info!(%chat, "running scheduled announcement update");
                self.announcer.publish(chat).await?
            }
        }
        Ok(())
    }

    /// Route one inbound event.
    pub async fn handle_event(&self, event: ChatEvent) -> Result<(), BotError> {
        match event {
            ChatEvent::MembersJoined { chat, members } => {
                self.admin.gate().on_join(chat, &members).await?;
            }
            ChatEvent::Text {
                chat, sender, text, ..
            } => {
                if let Some(command) = parse_command(&text) {
                    self.handle_command(chat, &sender, command).await?;
                } else if self.settings.tag_pattern.is_match(&text) {
                    self.admin.gate().on_identify(chat, &sender).await?;
                }
            }
        }
        Ok(())
    }

    async fn handle_command(
        &self,
        chat: ChatId,
        sender: &ChatUser,
        command: Command,
    ) -> Result<(), BotError> {
        match command {
            Command::Events => {
                let events = self.announcer.events(chat).await?;
                let message = Announcer::<C, S>::render(&events);
                self.client
                    .send_message(chat, &message, SendOptions::html().without_preview())
                    .await?;
            }
            Command::Update => {
                self.announcer.refresh(chat).await?;
                self.announcer.publish(chat).await?;
            }
            Command::Help => {
                self.client
                    .send_message(chat, text::HELP, SendOptions::plain())
                    .await?;
            }
            Command::SetTimer => {
                if self.require_admin(chat, sender).await? {
                    return Ok(());
                }
                let replaced = self.scheduler.cancel(&JobKey::Announce { chat });
                self.scheduler.schedule(
                    JobKey::Announce { chat },
                    When::Every {
                        first: self.settings.announce_first,
                        interval: self.settings.announce_interval,
                    },
                    JobPayload::RefreshAnnouncement { chat },
                );
                let mut reply = String::from("Update timer set.");
                if replaced {
                    reply.push_str(" The old one was replaced.");
                }
                self.client
                    .send_message(chat, &reply, SendOptions::plain())
                    .await?;
            }
            Command::UnsetTimer => {
                if self.require_admin(chat, sender).await? {
                    return Ok(());
                }
                let removed = self.scheduler.cancel(&JobKey::Announce { chat });
                let reply = if removed {
                    "Update timer removed."
                } else {
                    "There is no active update timer."
                };
                self.client
                    .send_message(chat, reply, SendOptions::plain())
                    .await?;
            }
            Command::CreateEvent { url } => {
                let Some(url) = url else {
                    self.client
                        .send_message(chat, text::NO_EVENT_URL, SendOptions::plain())
                        .await?;
                    return Ok(());
                };
                let reply = match self.announcer.create_event(chat, &url).await {
                    Ok(_) => text::EVENT_CREATED,
                    Err(EventSourceError::UnsupportedUrl(_)) => text::UNSUPPORTED_EVENT_URL,
                    Err(e) => {
                        warn!(%chat, error = %e, "event creation failed");
                        text::EVENT_CREATION_FAILED
                    }
                };
                self.client
                    .send_message(chat, reply, SendOptions::plain())
                    .await?;
            }
            Command::GuestList { handle } => match handle {
                Some(handle) => self.admin.guest_list(chat, sender, &handle).await?,
                None => {
                    self.client
                        .send_message(chat, text::USER_NOT_FOUND, SendOptions::plain())
                        .await?;
                }
            },
            Command::Kick { handle } => match handle {
                Some(handle) => self.admin.kick(chat, sender, &handle).await?,
                None => {
                    self.client
                        .send_message(chat, text::USER_NOT_FOUND, SendOptions::plain())
                        .await?;
                }
            },
            Command::Unknown(verb) => {
                // Unknown commands are somebody else's bot; stay quiet.
                tracing::debug!(%chat, verb, "ignoring unknown command");
            }
        }
        Ok(())
    }

    /// True (after replying) when the sender may not use admin commands.
    async fn require_admin(&self, chat: ChatId, sender: &ChatUser) -> Result<bool, BotError> {
        if sender.id == self.settings.admin {
            return Ok(false);
        }
        self.client
            .send_message(chat, text::ADMIN_ACCESS_DENIED, SendOptions::plain())
            .await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announce::MockEventSource;
    use crate::chat::{MessageId, MockChatClient};

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_command("/events"), Some(Command::Events));
        assert_eq!(parse_command("/update"), Some(Command::Update));
        assert_eq!(parse_command("/help"), Some(Command::Help));
        assert_eq!(parse_command("hello there"), None);
    }

    #[test]
    fn parses_addressed_and_argument_commands() {
        assert_eq!(parse_command("/set@gatehouse_bot"), Some(Command::SetTimer));
        assert_eq!(
            parse_command("/guestlist @ada please"),
            Some(Command::GuestList {
                handle: Some("@ada".to_string())
            })
        );
        assert_eq!(
            parse_command("/kick nobody-here"),
            Some(Command::Kick { handle: None })
        );
        assert_eq!(
            parse_command("/createevent check https://ra.co/events/123 out"),
            Some(Command::CreateEvent {
                url: Some("https://ra.co/events/123".to_string())
            })
        );
    }

    #[test]
    fn unknown_verbs_are_preserved() {
        assert_eq!(
            parse_command("/frobnicate now"),
            Some(Command::Unknown("frobnicate".to_string()))
        );
    }

    #[test]
    fn default_tag_pattern_is_whole_word() {
        let settings = BotSettings::default();
        assert!(settings.tag_pattern.is_match("hi #whois everyone"));
        assert!(settings.tag_pattern.is_match("#WHOIS"));
        assert!(!settings.tag_pattern.is_match("#whoisthis"));
    }

    fn bot() -> (
        GateBot<MockChatClient, MockEventSource>,
        MockChatClient,
    ) {
        let client = MockChatClient::new();
        let source = MockEventSource::new();
        let settings = BotSettings {
            admin: UserId(1),
            ..Default::default()
        };
        (
            GateBot::new(client.clone(), source, StateStore::in_memory(), settings),
            client,
        )
    }

    #[tokio::test]
    async fn set_command_is_admin_only() {
        let (bot, client) = bot();
        let chat = ChatId(1);
        let pleb = ChatUser::new(UserId(9), "Pleb");

        bot.handle_event(ChatEvent::Text {
            chat,
            sender: pleb,
            message_id: MessageId(1),
            text: "/set".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(client.sent_texts(chat), vec![text::ADMIN_ACCESS_DENIED]);
        assert!(bot.scheduler().is_empty());
    }

    #[tokio::test]
    async fn set_then_set_replaces_timer() {
        let (bot, client) = bot();
        let chat = ChatId(1);
        let boss = ChatUser::new(UserId(1), "Boss");

        for _ in 0..2 {
            bot.handle_event(ChatEvent::Text {
                chat,
                sender: boss.clone(),
                message_id: MessageId(1),
                text: "/set".to_string(),
            })
            .await
            .unwrap();
        }

        assert_eq!(bot.scheduler().pending(&JobKey::Announce { chat }), 1);
        let texts = client.sent_texts(chat);
        assert!(texts[1].contains("replaced"));
    }

    #[tokio::test]
    async fn unset_without_timer_says_so() {
        let (bot, client) = bot();
        let chat = ChatId(1);
        let boss = ChatUser::new(UserId(1), "Boss");

        bot.handle_event(ChatEvent::Text {
            chat,
            sender: boss,
            message_id: MessageId(1),
            text: "/unset".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(
            client.sent_texts(chat),
            vec!["There is no active update timer."]
        );
    }

    #[tokio::test]
    async fn createevent_requires_a_url() {
        let (bot, client) = bot();
        let chat = ChatId(1);

        bot.handle_event(ChatEvent::Text {
            chat,
            sender: ChatUser::new(UserId(5), "Someone"),
            message_id: MessageId(1),
            text: "/createevent tonight!!".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(client.sent_texts(chat), vec![text::NO_EVENT_URL]);
    }
}
