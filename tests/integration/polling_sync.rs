//! Integration tests for the polling sync engine.
//!
//! Drives [`GuestChat`] against a scripted backend on paused `tokio` time:
//!
//! 1. Mount loads the newest page, then polls every 10 s with `since`.
//! 2. Rate limiting shows a transient notice without disturbing the
//!    schedule.
//! 3. A 403 stops polling for good.
//! 4. Overlapping polls are reconciled by de-duplication.
//! 5. New support messages trigger the notification cue.

use std::sync::Arc;
use std::time::Duration;

use guestchat::api::ApiError;
use guestchat::api::scripted::ScriptedApi;
use guestchat::chat::{
    ChatEvent, GuestChat, NoticeKind, PageError, SendError, SyncState, WidgetState,
};
use guestchat::config::ChatConfig;
use guestchat::identity::DeviceIdentity;
use guestchat::notify::player::{StubBehavior, StubPlayer};
use guestchat::storage::{ClientStorage, MemoryStorage, SOUND_ENABLED_KEY};

use guestchat_proto::api::{ConversationQuery, ConversationResponse, Pagination};
use guestchat_proto::message::{Message, MessageId, SenderType, Timestamp};

use tokio::sync::mpsc;

type Chat = GuestChat<ScriptedApi, MemoryStorage, StubPlayer>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn widget_with(behavior: StubBehavior) -> (Chat, mpsc::Receiver<ChatEvent>, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let (chat, rx) = GuestChat::new(
        ScriptedApi::new(),
        Arc::clone(&storage),
        StubPlayer::new(behavior),
        DeviceIdentity::new("device-0001".into(), "Guest-0001".into()),
        ChatConfig::default(),
    );
    (chat, rx, storage)
}

fn widget() -> (Chat, mpsc::Receiver<ChatEvent>) {
    let (chat, rx, _) = widget_with(StubBehavior::Works);
    (chat, rx)
}

fn message(id: &str, sender: SenderType, at: &str) -> Message {
    Message {
        id: MessageId::new(id),
        content: format!("body of {id}"),
        sender_type: sender,
        sender_name: match sender {
            SenderType::Guest => "Guest-0001".to_string(),
            SenderType::Admin => "Support".to_string(),
        },
        created_at: Timestamp::parse(at).unwrap(),
        read: false,
    }
}

fn ts(at: &str) -> Timestamp {
    Timestamp::parse(at).unwrap()
}

/// Sleep just past `secs` seconds from the last call site.
async fn advance_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs) + Duration::from_millis(1)).await;
}

// ---------------------------------------------------------------------------
// Initial load and schedule
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn initial_load_merges_page_and_sets_watermark() {
    let (chat, _rx) = widget();
    chat.api().push_fetch(Ok(ConversationResponse {
        messages: vec![message("m1", SenderType::Admin, "2024-01-01T00:00:01Z")],
        pagination: Pagination {
            current_page: 1,
            limit: 20,
            total_pages: 1,
        },
    }));

    chat.mount().await;

    assert_eq!(chat.api().last_fetch_query(), Some(ConversationQuery::page(1, 20)));
    assert_eq!(chat.messages().len(), 1);
    assert_eq!(chat.watermark(), Some(ts("2024-01-01T00:00:01Z")));
    assert_eq!(chat.state(), WidgetState::default());
    assert!(!chat.has_older());
}

#[tokio::test(start_paused = true)]
async fn polls_every_interval_with_since_watermark() {
    let (chat, _rx) = widget();
    chat.api()
        .push_messages(vec![message("m1", SenderType::Guest, "2024-01-01T00:00:01Z")]);
    chat.mount().await;
    assert_eq!(chat.api().fetch_count(), 1);

    chat.api()
        .push_messages(vec![message("m2", SenderType::Admin, "2024-01-01T00:00:02Z")]);

    tokio::time::sleep(Duration::from_millis(9_900)).await;
    assert_eq!(chat.api().fetch_count(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(chat.api().fetch_count(), 2);
    assert_eq!(
        chat.api().last_fetch_query(),
        Some(ConversationQuery::since(ts("2024-01-01T00:00:01Z")))
    );
    assert_eq!(chat.messages().len(), 2);
    assert_eq!(chat.watermark(), Some(ts("2024-01-01T00:00:02Z")));

    advance_secs(10).await;
    assert_eq!(chat.api().fetch_count(), 3);
    assert_eq!(
        chat.api().last_fetch_query(),
        Some(ConversationQuery::since(ts("2024-01-01T00:00:02Z")))
    );
}

#[tokio::test(start_paused = true)]
async fn mounting_twice_does_not_double_poll() {
    let (chat, _rx) = widget();
    chat.mount().await;
    chat.mount().await;
    assert_eq!(chat.api().fetch_count(), 1);

    advance_secs(10).await;
    assert_eq!(chat.api().fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn unmount_stops_polling() {
    let (chat, _rx) = widget();
    chat.mount().await;
    advance_secs(10).await;
    assert_eq!(chat.api().fetch_count(), 2);

    chat.unmount();
    assert!(!chat.is_mounted());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(chat.api().fetch_count(), 2);
    assert_eq!(chat.poll_once().await, Ok(0));
}

#[tokio::test(start_paused = true)]
async fn response_arriving_after_unmount_is_discarded() {
    let (chat, _rx) = widget();
    chat.mount().await;
    chat.api().set_fetch_delay(Duration::from_secs(3));
    chat.api()
        .push_messages(vec![message("late", SenderType::Admin, "2024-01-01T00:00:09Z")]);

    let poller = chat.clone();
    let handle = tokio::spawn(async move { poller.poll_once().await });
    tokio::time::sleep(Duration::from_millis(1)).await;
    chat.unmount();

    assert_eq!(handle.await.unwrap(), Ok(0));
    assert!(chat.messages().is_empty());
    assert_eq!(chat.player().plays(), 0);
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rate_limited_poll_shows_transient_notice_and_keeps_schedule() {
    let (chat, _rx) = widget();
    chat.mount().await;
    chat.api().push_fetch(Err(ApiError::RateLimited));

    // t = 10 s: the poll is refused.
    advance_secs(10).await;
    assert_eq!(chat.api().fetch_count(), 2);
    assert_eq!(chat.state().sync(), Some(SyncState::RateLimited));
    let notice = chat.notice().unwrap();
    assert_eq!(notice.kind, NoticeKind::RateLimited);
    assert!(notice.dismissable);

    // t = 14.9 s: still visible; t = 15.1 s: gone.
    tokio::time::sleep(Duration::from_millis(4_899)).await;
    assert!(chat.notice().is_some());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(chat.notice().is_none());

    // t = 20 s: the next poll fires on schedule and succeeds.
    tokio::time::sleep(Duration::from_millis(4_901)).await;
    assert_eq!(chat.api().fetch_count(), 3);
    assert_eq!(chat.state().sync(), Some(SyncState::Idle));
}

#[tokio::test(start_paused = true)]
async fn generic_poll_failure_keeps_polling() {
    let (chat, _rx) = widget();
    chat.mount().await;
    chat.api().push_fetch(Err(ApiError::Network("unreachable".into())));

    advance_secs(10).await;
    assert_eq!(chat.state().sync(), Some(SyncState::Error));
    assert_eq!(chat.notice().map(|n| n.kind), Some(NoticeKind::Error));

    advance_secs(10).await;
    assert_eq!(chat.api().fetch_count(), 3);
    assert_eq!(chat.state().sync(), Some(SyncState::Idle));
}

#[tokio::test(start_paused = true)]
async fn forbidden_initial_load_never_starts_polling() {
    let (chat, _rx) = widget();
    chat.api().push_fetch(Err(ApiError::Blocked));
    chat.mount().await;

    assert_eq!(chat.state(), WidgetState::Blocked);
    assert_eq!(chat.notice().map(|n| n.kind), Some(NoticeKind::Blocked));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(chat.api().fetch_count(), 1);
    assert_eq!(chat.poll_once().await, Ok(0));
    assert_eq!(chat.load_older_page().await, Err(PageError::Blocked));
    assert_eq!(chat.api().fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn forbidden_scheduled_poll_halts_loop() {
    let (chat, _rx) = widget();
    chat.mount().await;
    chat.api().push_fetch(Err(ApiError::Blocked));

    advance_secs(10).await;
    assert_eq!(chat.api().fetch_count(), 2);
    assert!(chat.state().is_blocked());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(chat.api().fetch_count(), 2);
    assert_eq!(chat.send("hello").await, Err(SendError::Blocked));
    assert_eq!(chat.api().send_count(), 0);
}

// ---------------------------------------------------------------------------
// Overlap and de-duplication
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_polls_overlap_without_duplicates() {
    let (chat, _rx) = widget();
    chat.mount().await;

    // Every fetch now takes 15 s, longer than the 10 s interval.
    chat.api().set_fetch_delay(Duration::from_secs(15));
    let shared = message("m1", SenderType::Admin, "2024-01-01T00:00:01Z");
    chat.api().push_messages(vec![shared.clone()]);
    chat.api().push_messages(vec![shared.clone()]);

    // Ticks at 10, 20, 30 s; the first two responses land at 25 and 35 s.
    tokio::time::sleep(Duration::from_secs(36)).await;
    assert_eq!(chat.api().fetch_count(), 4);
    assert_eq!(chat.messages(), vec![shared]);
    assert_eq!(chat.player().plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn unordered_batch_is_stored_sorted() {
    let (chat, _rx) = widget();
    chat.api().push_messages(vec![
        message("m3", SenderType::Admin, "2024-01-01T00:00:03Z"),
        message("m1", SenderType::Guest, "2024-01-01T00:00:01Z"),
        message("m2", SenderType::Admin, "2024-01-01T00:00:02Z"),
    ]);
    chat.mount().await;

    let ids: Vec<_> = chat.messages().iter().map(|m| m.id.to_string()).collect();
    assert_eq!(ids, ["m1", "m2", "m3"]);
    assert_eq!(chat.watermark(), Some(ts("2024-01-01T00:00:03Z")));
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn older_pages_prepend_without_moving_watermark() {
    let (chat, _rx) = widget();
    chat.api().push_fetch(Ok(ConversationResponse {
        messages: vec![message("m3", SenderType::Admin, "2024-01-01T00:00:03Z")],
        pagination: Pagination {
            current_page: 1,
            limit: 1,
            total_pages: 3,
        },
    }));
    chat.mount().await;
    assert!(chat.has_older());

    chat.api().push_fetch(Ok(ConversationResponse {
        messages: vec![message("m2", SenderType::Admin, "2024-01-01T00:00:02Z")],
        pagination: Pagination {
            current_page: 2,
            limit: 1,
            total_pages: 3,
        },
    }));
    assert_eq!(chat.load_older_page().await, Ok(1));
    assert_eq!(chat.api().last_fetch_query(), Some(ConversationQuery::page(2, 1)));
    assert_eq!(chat.messages()[0].id.as_str(), "m2");
    assert_eq!(chat.watermark(), Some(ts("2024-01-01T00:00:03Z")));
    assert_eq!(chat.pagination().page, 2);

    chat.api().push_fetch(Ok(ConversationResponse {
        messages: vec![message("m1", SenderType::Guest, "2024-01-01T00:00:01Z")],
        pagination: Pagination {
            current_page: 3,
            limit: 1,
            total_pages: 3,
        },
    }));
    assert_eq!(chat.load_older_page().await, Ok(1));
    assert!(!chat.has_older());

    // Nothing older: no request at all.
    let fetches = chat.api().fetch_count();
    assert_eq!(chat.load_older_page().await, Ok(0));
    assert_eq!(chat.api().fetch_count(), fetches);
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn support_messages_play_cue_guest_messages_do_not() {
    let (chat, _rx) = widget();
    chat.mount().await;

    chat.api()
        .push_messages(vec![message("g1", SenderType::Guest, "2024-01-01T00:00:01Z")]);
    advance_secs(10).await;
    assert_eq!(chat.player().plays(), 0);

    chat.api()
        .push_messages(vec![message("a1", SenderType::Admin, "2024-01-01T00:00:02Z")]);
    advance_secs(10).await;
    assert_eq!(chat.player().plays(), 1);

    // Re-delivery of the same message is not new.
    chat.api()
        .push_messages(vec![message("a1", SenderType::Admin, "2024-01-01T00:00:02Z")]);
    advance_secs(10).await;
    assert_eq!(chat.player().plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_cue_mutes_and_persists() {
    let (chat, _rx, storage) = widget_with(StubBehavior::Missing);
    chat.api()
        .push_messages(vec![message("a1", SenderType::Admin, "2024-01-01T00:00:02Z")]);
    chat.mount().await;

    assert!(!chat.sound_enabled());
    assert_eq!(storage.get(SOUND_ENABLED_KEY).as_deref(), Some("false"));
    assert_eq!(chat.notice().map(|n| n.kind), Some(NoticeKind::Warning));
    assert_eq!(chat.player().plays(), 0);
}

#[tokio::test(start_paused = true)]
async fn refused_playback_warns_once_and_keeps_sound_on() {
    let (chat, _rx, _) = widget_with(StubBehavior::Refused);
    chat.api()
        .push_messages(vec![message("a1", SenderType::Admin, "2024-01-01T00:00:01Z")]);
    chat.mount().await;
    assert!(chat.sound_enabled());
    assert_eq!(chat.notice().map(|n| n.kind), Some(NoticeKind::Warning));

    assert!(chat.dismiss_notice());
    chat.api()
        .push_messages(vec![message("a2", SenderType::Admin, "2024-01-01T00:00:02Z")]);
    advance_secs(10).await;
    assert!(chat.notice().is_none());
    assert!(chat.sound_enabled());
}

#[tokio::test(start_paused = true)]
async fn muted_widget_stays_silent() {
    let (chat, _rx) = widget();
    assert!(!chat.set_sound_enabled(false));
    chat.api()
        .push_messages(vec![message("a1", SenderType::Admin, "2024-01-01T00:00:01Z")]);
    chat.mount().await;
    assert_eq!(chat.player().plays(), 0);
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn merged_messages_are_announced() {
    let (chat, mut rx) = widget();
    chat.api()
        .push_messages(vec![message("m1", SenderType::Guest, "2024-01-01T00:00:01Z")]);
    chat.mount().await;

    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    assert!(events.contains(&ChatEvent::MessagesChanged));
    assert!(events.contains(&ChatEvent::StateChanged(WidgetState::default())));
}
