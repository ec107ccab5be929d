//! End-to-end onboarding lifecycle tests.
//!
//! Exercises the full bot (event routing, gate, scheduler) against the mock
//! chat client under a paused tokio clock: join, identify, warn, kick and
//! the admin guest-list override.

use gatehouse::announce::MockEventSource;
use gatehouse::bot::{BotSettings, GateBot};
use gatehouse::chat::{ChatEvent, ChatId, ChatUser, MessageId, MockChatClient, UserId};
use gatehouse::store::StateStore;
use std::time::Duration;
use tokio::time::{advance, pause};

const WARN_DELAY: Duration = Duration::from_secs(90 * 60);
const KICK_DELAY: Duration = Duration::from_secs(30 * 60);
const ADMIN: UserId = UserId(1);
const CHAT: ChatId = ChatId(-1000);

fn bot() -> (
    GateBot<MockChatClient, MockEventSource>,
    MockChatClient,
    StateStore,
) {
    let client = MockChatClient::new();
    let source = MockEventSource::new();
    let store = StateStore::in_memory();
    let settings = BotSettings {
        admin: ADMIN,
        ..Default::default()
    };
    let bot = GateBot::new(client.clone(), source, store.clone(), settings);
    (bot, client, store)
}

fn join(user: &ChatUser) -> ChatEvent {
    ChatEvent::MembersJoined {
        chat: CHAT,
        members: vec![user.clone()],
    }
}

fn says(user: &ChatUser, text: &str) -> ChatEvent {
    ChatEvent::Text {
        chat: CHAT,
        sender: user.clone(),
        message_id: MessageId(9999),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn member_who_identifies_in_time_is_left_alone() {
    pause();
    let (bot, client, store) = bot();
    let ada = ChatUser::new(UserId(42), "Ada").with_handle("ada");

    bot.handle_event(join(&ada)).await.unwrap();
    assert_eq!(client.sent_texts(CHAT).len(), 1, "welcome only");
    assert!(store.is_pending(ada.id));
    assert_eq!(bot.scheduler().len(), 1);

    // Half an hour of silence changes nothing.
    advance(Duration::from_secs(30 * 60)).await;
    bot.fire_due_jobs().await;
    assert_eq!(client.sent_texts(CHAT).len(), 1);

    bot.handle_event(says(&ada, "hi all, #whois I'm Ada, friend of Grace"))
        .await
        .unwrap();
    assert!(!store.is_pending(ada.id));
    assert!(bot.scheduler().is_empty(), "gate job cancelled on identify");

    // Long after both deadlines, nothing else ever happens to her.
    advance(WARN_DELAY + KICK_DELAY + Duration::from_secs(60)).await;
    bot.fire_due_jobs().await;

    let texts = client.sent_texts(CHAT);
    assert_eq!(texts.len(), 2, "welcome and confirmation, nothing else");
    assert!(texts[1].contains("Thanks"));
    assert!(client.banned().is_empty());
    assert!(client.deleted().is_empty());
}

#[tokio::test]
async fn silent_member_is_warned_then_kicked() {
    pause();
    let (bot, client, store) = bot();
    let lurker = ChatUser::new(UserId(43), "Lurker").with_handle("lurk");

    bot.handle_event(join(&lurker)).await.unwrap();
    let welcome_id = client.sent_messages()[0].id;

    advance(WARN_DELAY).await;
    bot.fire_due_jobs().await;
    let texts = client.sent_texts(CHAT);
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("introduce"), "warning nags for the intro");
    let warn_id = client.sent_messages()[1].id;
    assert_eq!(bot.scheduler().len(), 1, "kick timer armed");

    advance(KICK_DELAY).await;
    bot.fire_due_jobs().await;

    // Kick notice, then ban-and-release so they can rejoin later.
    assert_eq!(client.sent_texts(CHAT).len(), 3);
    assert_eq!(client.banned(), vec![(CHAT, lurker.id)]);
    assert_eq!(client.unbanned(), vec![(CHAT, lurker.id, true)]);

    // Both gate messages were swept up.
    assert_eq!(client.deleted(), vec![(CHAT, welcome_id), (CHAT, warn_id)]);

    // Bookkeeping is gone and no timers are left.
    assert!(!store.is_pending(lurker.id));
    assert!(store.display_name(CHAT, lurker.id).is_none());
    assert!(bot.scheduler().is_empty());
}

#[tokio::test]
async fn identify_after_warn_still_resolves() {
    pause();
    let (bot, client, store) = bot();
    let slow = ChatUser::new(UserId(44), "Slow");

    bot.handle_event(join(&slow)).await.unwrap();
    advance(WARN_DELAY).await;
    bot.fire_due_jobs().await;
    assert_eq!(client.sent_texts(CHAT).len(), 2);

    bot.handle_event(says(&slow, "#whois sorry, I was asleep"))
        .await
        .unwrap();
    assert!(!store.is_pending(slow.id));
    assert!(bot.scheduler().is_empty());

    advance(KICK_DELAY).await;
    bot.fire_due_jobs().await;
    assert!(client.banned().is_empty(), "kick never fires after identify");
    assert_eq!(client.sent_texts(CHAT).len(), 3);
}

#[tokio::test]
async fn admin_guest_lists_a_pending_member() {
    pause();
    let (bot, client, store) = bot();
    let admin = ChatUser::new(ADMIN, "Boss");
    let guest = ChatUser::new(UserId(45), "Guest").with_handle("guest");

    bot.handle_event(join(&guest)).await.unwrap();
    let welcome_id = client.sent_messages()[0].id;

    bot.handle_event(says(&admin, "/guestlist @guest"))
        .await
        .unwrap();

    assert!(!store.is_pending(guest.id));
    assert!(bot.scheduler().is_empty());
    // The welcome is cleaned up like a normal resolution.
    assert_eq!(client.deleted(), vec![(CHAT, welcome_id)]);

    let texts = client.sent_texts(CHAT);
    assert!(texts.iter().any(|t| t.contains("guest list")));

    // No warn ever arrives for a guest-listed member.
    advance(WARN_DELAY + KICK_DELAY).await;
    bot.fire_due_jobs().await;
    assert!(client.banned().is_empty());
}

#[tokio::test]
async fn guest_list_is_rejected_for_non_admins() {
    let (bot, client, store) = bot();
    let pleb = ChatUser::new(UserId(50), "Pleb");
    let guest = ChatUser::new(UserId(45), "Guest").with_handle("guest");

    bot.handle_event(join(&guest)).await.unwrap();
    client.clear();

    bot.handle_event(says(&pleb, "/guestlist @guest"))
        .await
        .unwrap();

    assert!(
        client.sent_texts(CHAT)[0].contains("administrator"),
        "polite refusal"
    );
    assert!(store.is_pending(guest.id), "member state untouched");
    assert_eq!(bot.scheduler().len(), 1, "warn timer untouched");
}

#[tokio::test]
async fn guest_list_of_unknown_handle_reports_it() {
    let (bot, client, _store) = bot();
    let admin = ChatUser::new(ADMIN, "Boss");

    bot.handle_event(says(&admin, "/guestlist @nobody"))
        .await
        .unwrap();

    assert!(client.sent_texts(CHAT)[0].contains("don't know that user"));
    assert!(client.banned().is_empty());
}

#[tokio::test]
async fn admin_kick_ejects_immediately() {
    pause();
    let (bot, client, store) = bot();
    let admin = ChatUser::new(ADMIN, "Boss");
    let troll = ChatUser::new(UserId(46), "Troll").with_handle("troll");

    bot.handle_event(join(&troll)).await.unwrap();
    bot.handle_event(says(&admin, "/kick @troll")).await.unwrap();

    assert_eq!(client.banned(), vec![(CHAT, troll.id)]);
    assert_eq!(client.unbanned(), vec![(CHAT, troll.id, true)]);
    assert!(!store.is_pending(troll.id));
    assert!(store.display_name(CHAT, troll.id).is_none());
    assert!(bot.scheduler().is_empty());

    // Nothing lingers to fire later.
    advance(WARN_DELAY + KICK_DELAY).await;
    bot.fire_due_jobs().await;
    assert_eq!(client.banned().len(), 1);
}

#[tokio::test]
async fn member_can_identify_after_a_failed_welcome() {
    let (bot, client, store) = bot();
    let ada = ChatUser::new(UserId(48), "Ada").with_handle("ada");

    client.set_fail_network(true);
    assert!(bot.handle_event(join(&ada)).await.is_err());
    assert!(store.is_pending(ada.id), "flag was set before the send");
    assert!(bot.scheduler().is_empty(), "no timer survived the failure");

    client.set_fail_network(false);
    bot.handle_event(says(&ada, "#whois better late than never"))
        .await
        .unwrap();

    assert!(!store.is_pending(ada.id));
    let texts = client.sent_texts(CHAT);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Thanks"));
}

#[tokio::test]
async fn guest_list_settles_a_member_with_no_live_timer() {
    let (bot, client, store) = bot();
    let admin = ChatUser::new(ADMIN, "Boss");
    let ada = ChatUser::new(UserId(49), "Ada").with_handle("ada");

    client.set_fail_network(true);
    assert!(bot.handle_event(join(&ada)).await.is_err());
    client.set_fail_network(false);

    bot.handle_event(says(&admin, "/guestlist @ada"))
        .await
        .unwrap();

    assert!(!store.is_pending(ada.id));
    assert!(client
        .sent_texts(CHAT)
        .iter()
        .any(|t| t.contains("guest list")));
}

#[tokio::test]
async fn bots_joining_are_never_gated() {
    let (bot, client, _store) = bot();
    let helper = ChatUser::new(UserId(900), "OtherBot").bot();
    let human = ChatUser::new(UserId(47), "Human");

    bot.handle_event(ChatEvent::MembersJoined {
        chat: CHAT,
        members: vec![helper, human.clone()],
    })
    .await
    .unwrap();

    // Only the human gets a welcome and a timer.
    assert_eq!(client.sent_texts(CHAT).len(), 1);
    assert_eq!(bot.scheduler().len(), 1);
}
