//! End-to-end tests: [`GuestChat`] over [`HttpChatApi`] against an
//! in-process `guestchat-server`.
//!
//! Each test starts its own server on `127.0.0.1:0` and drives the
//! support side directly through the server's conversation store.

use std::sync::Arc;
use std::time::Duration;

use guestchat::api::ApiError;
use guestchat::api::http::{DEFAULT_USER_AGENT, HttpChatApi};
use guestchat::chat::{ChatEvent, GuestChat, NoticeKind, SendError, WidgetState};
use guestchat::config::ChatConfig;
use guestchat::identity::{self, DeviceIdentity};
use guestchat::notify::player::StubPlayer;
use guestchat::storage::{ClientStorage, DEVICE_ID_KEY, DEVICE_NAME_KEY, FileStorage, MemoryStorage};

use guestchat_proto::message::SenderType;
use guestchat_server::config::ServerConfig;
use guestchat_server::server::{self, ServerState};

use tokio::sync::mpsc;

type HttpChat = GuestChat<HttpChatApi, MemoryStorage, StubPlayer>;

const DEVICE: &str = "3f2a9c1e-0000-4000-8000-00000000beef";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn start_backend(state: ServerState) -> (String, Arc<ServerState>) {
    let state = Arc::new(state);
    let (addr, _handle) = server::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();
    (format!("http://{addr}"), state)
}

fn connect(base_url: &str) -> (HttpChat, mpsc::Receiver<ChatEvent>) {
    let api = HttpChatApi::new(base_url, Duration::from_secs(5), DEFAULT_USER_AGENT).unwrap();
    GuestChat::new(
        api,
        Arc::new(MemoryStorage::new()),
        StubPlayer::default(),
        DeviceIdentity::new(DEVICE.into(), "Guest-beef".into()),
        ChatConfig::default(),
    )
}

async fn stored_count(state: &ServerState) -> usize {
    state.store.page(DEVICE, 1, 100).await.0.len()
}

fn temp_state_file() -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("guestchat-test-{}", uuid::Uuid::now_v7()))
        .join("state.json")
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[tokio::test]
async fn support_reply_is_polled_and_sets_watermark() {
    let (base, state) = start_backend(ServerState::new()).await;
    let reply = state
        .store
        .append(DEVICE, SenderType::Admin, None, "Hi, how can we help?")
        .await;

    let (chat, _rx) = connect(&base);
    chat.mount().await;

    assert_eq!(chat.messages(), vec![reply.clone()]);
    assert_eq!(chat.watermark(), Some(reply.created_at));
    assert_eq!(chat.player().plays(), 1);

    // Nothing new: the next poll merges nothing.
    assert_eq!(chat.poll_once().await, Ok(0));
    chat.unmount();
}

#[tokio::test]
async fn sent_message_round_trips_through_server() {
    let (base, state) = start_backend(ServerState::new()).await;
    let (chat, _rx) = connect(&base);
    chat.mount().await;

    let sent = chat.send("  where is my order?  ").await.unwrap();
    assert_eq!(sent.content, "where is my order?");
    assert!(!sent.is_temp());
    assert_eq!(chat.messages(), vec![sent.clone()]);
    assert_eq!(chat.watermark(), Some(sent.created_at));
    assert_eq!(stored_count(&state).await, 1);

    let reply = state
        .store
        .append(DEVICE, SenderType::Admin, Some("Dana".into()), "Shipped today.")
        .await;
    assert_eq!(chat.poll_once().await, Ok(1));
    assert_eq!(chat.messages(), vec![sent, reply]);
    chat.unmount();
}

#[tokio::test]
async fn history_pages_load_oldest_last() {
    let (base, state) = start_backend(ServerState::new()).await;
    for i in 0..45 {
        state
            .store
            .append(DEVICE, SenderType::Guest, None, &format!("message {i}"))
            .await;
    }

    let (chat, _rx) = connect(&base);
    chat.mount().await;
    assert_eq!(chat.messages().len(), 20);
    assert_eq!(chat.messages()[0].content, "message 25");
    assert!(chat.has_older());

    assert_eq!(chat.load_older_page().await, Ok(20));
    assert_eq!(chat.load_older_page().await, Ok(5));
    assert!(!chat.has_older());

    let contents: Vec<_> = chat.messages().into_iter().map(|m| m.content).collect();
    let expected: Vec<_> = (0..45).map(|i| format!("message {i}")).collect();
    assert_eq!(contents, expected);
    chat.unmount();
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocked_device_is_halted() {
    let (base, state) = start_backend(ServerState::new()).await;
    let (chat, _rx) = connect(&base);
    chat.mount().await;

    state.store.set_blocked(DEVICE, true).await;
    assert_eq!(chat.poll_once().await, Err(ApiError::Blocked));
    assert_eq!(chat.state(), WidgetState::Blocked);
    assert_eq!(chat.notice().map(|n| n.kind), Some(NoticeKind::Blocked));

    assert_eq!(chat.send("let me in").await, Err(SendError::Blocked));
    assert_eq!(stored_count(&state).await, 0);
    chat.unmount();
}

#[tokio::test]
async fn rate_limited_poll_surfaces_transient_notice() {
    let config = ServerConfig {
        rate_limit_requests: 1,
        rate_limit_window: Duration::from_secs(60),
        ..ServerConfig::default()
    };
    let (base, _) = start_backend(ServerState::with_config(&config)).await;
    let (chat, _rx) = connect(&base);
    chat.mount().await;

    assert_eq!(chat.poll_once().await, Err(ApiError::RateLimited));
    let notice = chat.notice().unwrap();
    assert_eq!(notice.kind, NoticeKind::RateLimited);
    assert!(notice.dismissable);
    assert!(!chat.state().is_blocked());
    chat.unmount();
}

#[tokio::test]
async fn unreachable_backend_rolls_send_back() {
    // Bind and immediately drop a listener to get a closed port.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (chat, _rx) = connect(&format!("http://{addr}"));
    chat.mount().await;

    let err = chat.send("hello?").await.unwrap_err();
    assert!(matches!(
        err,
        SendError::Api(ApiError::Network(_) | ApiError::Timeout)
    ));
    assert!(chat.messages().is_empty());
    assert!(!chat.is_sending());
    chat.unmount();
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rename_is_applied_on_server_and_later_messages() {
    let (base, state) = start_backend(ServerState::new()).await;
    let (chat, _rx) = connect(&base);
    chat.mount().await;

    assert_eq!(chat.rename("  Alice  ").await.unwrap(), "Alice");
    assert_eq!(chat.device_name(), "Alice");
    assert_eq!(state.store.device_name(DEVICE).await.as_deref(), Some("Alice"));

    let sent = chat.send("hi").await.unwrap();
    assert_eq!(sent.sender_name, "Alice");
    chat.unmount();
}

#[test]
fn file_backed_identity_is_generated_once_and_reused() {
    let path = temp_state_file();

    let first = {
        let storage = FileStorage::open(&path).unwrap();
        let identity = DeviceIdentity::load_or_create(&storage);
        assert!(identity::is_valid_device_id(identity.id()));
        assert!(identity.name().starts_with(identity::DEFAULT_NAME_PREFIX));
        assert_eq!(storage.get(DEVICE_ID_KEY).as_deref(), Some(identity.id()));
        assert_eq!(storage.get(DEVICE_NAME_KEY).as_deref(), Some(identity.name()));
        identity
    };

    // A fresh handle on the same file sees the same identity.
    let storage = FileStorage::open(&path).unwrap();
    assert_eq!(DeviceIdentity::load_or_create(&storage), first);
    assert_eq!(DeviceIdentity::load_or_create(&storage), first);

    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}
