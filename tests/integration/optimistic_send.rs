//! Integration tests for the optimistic send pipeline.
//!
//! Covers the send lifecycle end to end through [`GuestChat`] with a
//! scripted backend:
//!
//! 1. A temporary entry is visible while the request is in flight and is
//!    swapped for the confirmed record on success.
//! 2. Every failure kind rolls the temporary entry back and frees the send
//!    slot.
//! 3. A 403 blocks the widget; later sends never reach the network.

use std::sync::Arc;
use std::time::Duration;

use guestchat::api::ApiError;
use guestchat::api::scripted::ScriptedApi;
use guestchat::chat::{ChatEvent, GuestChat, NoticeKind, SendError, WidgetState};
use guestchat::config::ChatConfig;
use guestchat::identity::DeviceIdentity;
use guestchat::notify::player::StubPlayer;
use guestchat::storage::MemoryStorage;

use guestchat_proto::message::{
    MAX_CONTENT_LEN, Message, MessageId, SenderType, Timestamp, ValidationError,
};

use tokio::sync::mpsc;

type Chat = GuestChat<ScriptedApi, MemoryStorage, StubPlayer>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A mounted widget over an empty scripted backend.
async fn mounted_widget() -> (Chat, mpsc::Receiver<ChatEvent>) {
    let (chat, rx) = GuestChat::new(
        ScriptedApi::new(),
        Arc::new(MemoryStorage::new()),
        StubPlayer::default(),
        DeviceIdentity::new("device-0001".into(), "Guest-0001".into()),
        ChatConfig::default(),
    );
    chat.mount().await;
    (chat, rx)
}

fn confirmed(id: &str, at: &str, content: &str) -> Message {
    Message {
        id: MessageId::new(id),
        content: content.to_string(),
        sender_type: SenderType::Guest,
        sender_name: "Guest-0001".to_string(),
        created_at: Timestamp::parse(at).unwrap(),
        read: false,
    }
}

/// Let spawned tasks run up to their next await point.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn temp_entry_is_replaced_by_confirmed_message() {
    let (chat, _rx) = mounted_widget().await;
    let reply = confirmed("srv-42", "2024-01-01T00:00:05Z", "hello");
    chat.api().push_send(Ok(reply.clone()));
    chat.api().set_send_delay(Duration::from_secs(1));

    let sender = chat.clone();
    let handle = tokio::spawn(async move { sender.send("  hello  ").await });
    settle().await;

    // In flight: one temporary entry, send slot taken.
    let pending = chat.messages();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].id.as_str().starts_with("temp-"));
    assert_eq!(pending[0].content, "hello");
    assert_eq!(pending[0].sender_name, "Guest-0001");
    assert!(chat.is_sending());

    let result = handle.await.unwrap().unwrap();
    assert_eq!(result, reply);

    // Confirmed: same length, server id, slot released.
    let after = chat.messages();
    assert_eq!(after, vec![reply.clone()]);
    assert!(!chat.is_sending());
    assert_eq!(chat.watermark(), Some(reply.created_at));
    assert!(chat.notice().is_none());
}

#[tokio::test(start_paused = true)]
async fn second_send_while_in_flight_is_busy() {
    let (chat, _rx) = mounted_widget().await;
    chat.api().set_send_delay(Duration::from_secs(1));

    let sender = chat.clone();
    let first = tokio::spawn(async move { sender.send("one").await });
    settle().await;

    assert_eq!(chat.send("two").await, Err(SendError::Busy));
    assert_eq!(chat.api().send_count(), 1);

    assert!(first.await.unwrap().is_ok());
    assert!(chat.send("three").await.is_ok());
    assert_eq!(chat.api().send_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn poll_delivering_confirmation_first_leaves_one_entry() {
    let (chat, _rx) = mounted_widget().await;
    let reply = confirmed("srv-7", "2024-01-01T00:00:07Z", "race");
    chat.api().push_send(Ok(reply.clone()));
    chat.api().set_send_delay(Duration::from_secs(2));

    let sender = chat.clone();
    let handle = tokio::spawn(async move { sender.send("race").await });
    settle().await;

    // A poll lands the confirmed record before the send returns.
    chat.api().push_messages(vec![reply.clone()]);
    assert_eq!(chat.poll_once().await.unwrap(), 1);
    assert_eq!(chat.messages().len(), 2);

    handle.await.unwrap().unwrap();
    assert_eq!(chat.messages(), vec![reply]);
}

#[tokio::test(start_paused = true)]
async fn invalid_content_never_reaches_backend() {
    let (chat, _rx) = mounted_widget().await;

    // Blank input is dropped silently.
    assert_eq!(
        chat.send("   \n ").await,
        Err(SendError::Validation(ValidationError::EmptyContent))
    );
    assert!(chat.notice().is_none());

    // Oversized input is refused with a transient error.
    let long = "x".repeat(MAX_CONTENT_LEN + 1);
    assert!(matches!(
        chat.send(&long).await,
        Err(SendError::Validation(ValidationError::ContentTooLong { .. }))
    ));
    assert_eq!(chat.notice().map(|n| n.kind), Some(NoticeKind::Error));

    assert_eq!(chat.api().send_count(), 0);
    assert!(chat.messages().is_empty());

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(chat.notice().is_none());
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn every_failure_kind_rolls_back() {
    let failures = [
        ApiError::RateLimited,
        ApiError::Timeout,
        ApiError::Network("connection reset".into()),
        ApiError::Decode("unexpected eof".into()),
        ApiError::Status {
            status: 500,
            message: "boom".into(),
        },
        ApiError::Blocked,
    ];

    for failure in failures {
        let (chat, _rx) = mounted_widget().await;
        chat.api().push_send(Err(failure.clone()));

        let err = chat.send("hello").await.unwrap_err();
        if failure == ApiError::Blocked {
            assert_eq!(err, SendError::Blocked);
        } else {
            assert_eq!(err, SendError::Api(failure.clone()));
        }

        assert!(chat.messages().is_empty(), "temp entry left after {failure:?}");
        assert!(!chat.is_sending(), "send slot held after {failure:?}");
        assert!(chat.notice().is_some(), "no notice after {failure:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn failure_notice_expires_and_widget_recovers() {
    let (chat, _rx) = mounted_widget().await;
    chat.api().push_send(Err(ApiError::Timeout));

    assert!(chat.send("hello").await.is_err());
    assert_eq!(chat.notice().map(|n| n.kind), Some(NoticeKind::Error));
    assert!(chat.notice().unwrap().dismissable);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(chat.notice().is_none());

    assert!(chat.send("hello again").await.is_ok());
    assert_eq!(chat.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_send_future_rolls_back() {
    let (chat, _rx) = mounted_widget().await;
    chat.api().set_send_delay(Duration::from_secs(30));

    let sender = chat.clone();
    let handle = tokio::spawn(async move { sender.send("abandoned").await });
    settle().await;
    assert_eq!(chat.messages().len(), 1);

    handle.abort();
    let _ = handle.await;

    assert!(chat.messages().is_empty());
    assert!(!chat.is_sending());
}

// ---------------------------------------------------------------------------
// Blocked
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn forbidden_send_blocks_widget_and_later_sends_are_local() {
    let (chat, _rx) = mounted_widget().await;
    chat.api().push_send(Err(ApiError::Blocked));

    assert_eq!(chat.send("hello").await, Err(SendError::Blocked));
    assert!(chat.messages().is_empty());
    assert_eq!(chat.state(), WidgetState::Blocked);

    let notice = chat.notice().unwrap();
    assert_eq!(notice.kind, NoticeKind::Blocked);
    assert!(!notice.dismissable);

    assert_eq!(chat.send("anyone there?").await, Err(SendError::Blocked));
    assert_eq!(chat.api().send_count(), 1);

    // Polling stops as well.
    let fetches = chat.api().fetch_count();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(chat.api().fetch_count(), fetches);
}
