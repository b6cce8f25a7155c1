//! The guest chat widget.
//!
//! [`GuestChat`] owns everything with widget lifetime: the message store,
//! the sync watermark, pagination, the notice banner, the notifier and the
//! poll task. It is created with an established [`DeviceIdentity`], so
//! polling can never start before the device has an ID.
//!
//! Three flows mutate the shared state: polling ([`sync`]), sending
//! ([`send`]) and history paging ([`pagination`]). All of them take the
//! same lock, never hold it across an `.await`, and merge through
//! [`MessageStore`], so completions can land in any order. Every mutation
//! is announced on the [`ChatEvent`] channel.

pub mod notice;
pub mod pagination;
pub mod send;
pub mod state;
pub mod store;
pub mod sync;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use guestchat_proto::message::{Message, Timestamp};

use crate::api::{ApiError, ChatApi};
use crate::config::ChatConfig;
use crate::identity::{self, DeviceIdentity, IdentityError};
use crate::notify::{Notifier, SoundPlayer, SoundWarning};
use crate::storage::ClientStorage;

pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use pagination::{PageError, PaginationState};
pub use send::SendError;
pub use state::{SendRejection, SyncState, WidgetState};
pub use store::{MessageStore, SyncWatermark};

/// Text of the persistent banner shown once the device is blocked.
pub const BLOCKED_NOTICE: &str =
    "This device has been blocked from support chat. Messages can no longer be sent.";

/// Events emitted by [`GuestChat`] for UI notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The message list changed; re-render and scroll to the newest entry.
    MessagesChanged,
    /// The widget state changed.
    StateChanged(WidgetState),
    /// A notice was shown.
    Notice(Notice),
    /// The notice was dismissed or expired.
    NoticeCleared,
    /// The display name changed after a successful rename.
    NameChanged(String),
    /// Sound was turned on or off.
    SoundChanged(bool),
}

/// A consistent copy of everything the presentation layer renders.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    /// Messages, oldest first.
    pub messages: Vec<Message>,
    /// Widget state.
    pub state: WidgetState,
    /// The visible notice, if any.
    pub notice: Option<Notice>,
    /// Loaded history window.
    pub pagination: PaginationState,
    /// Current display name.
    pub device_name: String,
    /// Whether sound is on.
    pub sound_enabled: bool,
}

/// Which flow a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Poll,
    Send,
    Page,
    Rename,
}

/// State shared between the poll, send and pagination flows.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) state: WidgetState,
    pub(crate) store: MessageStore,
    pub(crate) watermark: SyncWatermark,
    pub(crate) pagination: PaginationState,
    pub(crate) notices: NoticeBoard,
    pub(crate) device_name: String,
}

pub(crate) struct Inner<A, S: ?Sized, P> {
    pub(crate) api: A,
    pub(crate) storage: Arc<S>,
    pub(crate) config: ChatConfig,
    pub(crate) device_id: String,
    pub(crate) shared: Mutex<Shared>,
    pub(crate) notifier: Notifier<P, S>,
    pub(crate) mounted: AtomicBool,
    pub(crate) events: mpsc::Sender<ChatEvent>,
    pub(crate) poller: Mutex<Option<JoinHandle<()>>>,
}

impl<A, S: ?Sized, P> Drop for Inner<A, S, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().take() {
            handle.abort();
        }
    }
}

/// The guest chat widget.
///
/// Cheap to clone; clones share the same widget.
pub struct GuestChat<A, S: ?Sized, P> {
    pub(crate) inner: Arc<Inner<A, S, P>>,
}

impl<A, S: ?Sized, P> Clone for GuestChat<A, S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, S, P> GuestChat<A, S, P>
where
    A: ChatApi + 'static,
    S: ClientStorage + ?Sized + 'static,
    P: SoundPlayer + 'static,
{
    /// Create a widget for `identity`.
    ///
    /// Returns the widget and a receiver for [`ChatEvent`]s that the UI
    /// layer should consume. Nothing happens on the network until
    /// [`mount`](Self::mount).
    pub fn new(
        api: A,
        storage: Arc<S>,
        player: P,
        identity: DeviceIdentity,
        config: ChatConfig,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (events, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let notifier = Notifier::new(player, Arc::clone(&storage));
        let shared = Shared {
            state: WidgetState::default(),
            store: MessageStore::new(),
            watermark: SyncWatermark::new(),
            pagination: PaginationState::new(config.page_limit),
            notices: NoticeBoard::new(),
            device_name: identity.name().to_string(),
        };
        let inner = Inner {
            api,
            storage,
            device_id: identity.id().to_string(),
            config,
            shared: Mutex::new(shared),
            notifier,
            mounted: AtomicBool::new(false),
            events,
            poller: Mutex::new(None),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            event_rx,
        )
    }

    /// The stable device identifier sent with every request.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    /// The current display name.
    #[must_use]
    pub fn device_name(&self) -> String {
        self.inner.shared.lock().device_name.clone()
    }

    /// The backend client.
    #[must_use]
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    /// The sound player.
    #[must_use]
    pub fn player(&self) -> &P {
        self.inner.notifier.player()
    }

    /// Widget state.
    #[must_use]
    pub fn state(&self) -> WidgetState {
        self.inner.shared.lock().state
    }

    /// Messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.shared.lock().store.messages().to_vec()
    }

    /// The `since` value of the next poll.
    #[must_use]
    pub fn watermark(&self) -> Option<Timestamp> {
        self.inner.shared.lock().watermark.get()
    }

    /// Loaded history window.
    #[must_use]
    pub fn pagination(&self) -> PaginationState {
        self.inner.shared.lock().pagination
    }

    /// The visible notice, if any.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        self.inner.shared.lock().notices.current().cloned()
    }

    /// Whether sound is on.
    #[must_use]
    pub fn sound_enabled(&self) -> bool {
        self.inner.notifier.is_enabled()
    }

    /// Whether the widget is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Everything the UI renders, taken under one lock.
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        let sound_enabled = self.inner.notifier.is_enabled();
        let shared = self.inner.shared.lock();
        ChatSnapshot {
            messages: shared.store.messages().to_vec(),
            state: shared.state,
            notice: shared.notices.current().cloned(),
            pagination: shared.pagination,
            device_name: shared.device_name.clone(),
            sound_enabled,
        }
    }

    /// Mount the widget: load the newest page, then start polling.
    ///
    /// Mounting an already mounted widget does nothing.
    pub async fn mount(&self) {
        if self.inner.mounted.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(device_id = %self.inner.device_id, "mounting guest chat");

        // Failures are already surfaced as notices.
        let _ = self.poll_once().await;

        if !self.is_mounted() || self.state().is_blocked() {
            return;
        }
        let handle = tokio::spawn(sync::poll_loop(
            Arc::downgrade(&self.inner),
            self.inner.config.poll_interval,
        ));
        if let Some(previous) = self.inner.poller.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Tear the widget down.
    ///
    /// Stops the poll loop and every in-flight poll. Sends and page loads
    /// still in flight complete as no-ops.
    pub fn unmount(&self) {
        if !self.inner.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.inner.poller.lock().take() {
            handle.abort();
        }
        tracing::info!(device_id = %self.inner.device_id, "guest chat unmounted");
    }

    /// Change the display name.
    ///
    /// The name is validated, sent to the backend and persisted only once
    /// the backend accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] if the name is invalid, the backend call
    /// fails, or the accepted name cannot be stored. Invalid names and
    /// backend failures are also shown as a notice.
    pub async fn rename(&self, new_name: &str) -> Result<String, IdentityError> {
        let result = identity::rename_device(
            &self.inner.api,
            &*self.inner.storage,
            &self.inner.device_id,
            new_name,
        )
        .await;

        match &result {
            Ok(name) => {
                if self.is_mounted() {
                    self.inner.shared.lock().device_name.clone_from(name);
                    self.emit(ChatEvent::NameChanged(name.clone()));
                }
            }
            Err(IdentityError::Api(e)) => self.handle_failure(e, Flow::Rename),
            Err(IdentityError::InvalidName(e)) => {
                self.show_transient(NoticeKind::Error, format!("Could not change name: {e}"));
            }
            Err(_) => {}
        }
        result
    }

    /// Turn the notification sound on or off.
    ///
    /// Returns whether sound ended up enabled; turning it on fails quietly
    /// (with a warning notice) when the player is unusable.
    pub fn set_sound_enabled(&self, enabled: bool) -> bool {
        if let Some(warning) = self.inner.notifier.set_enabled(enabled) {
            self.show_warning(warning);
        }
        let now = self.inner.notifier.is_enabled();
        self.emit(ChatEvent::SoundChanged(now));
        now
    }

    /// Close the notice if it is dismissable.
    pub fn dismiss_notice(&self) -> bool {
        let dismissed = self.inner.shared.lock().notices.dismiss();
        if dismissed {
            self.emit(ChatEvent::NoticeCleared);
        }
        dismissed
    }

    pub(crate) fn emit(&self, event: ChatEvent) {
        if let Err(e) = self.inner.events.try_send(event) {
            tracing::trace!(error = %e, "chat event dropped");
        }
    }

    /// Apply the error taxonomy to a failed backend call.
    pub(crate) fn handle_failure(&self, error: &ApiError, flow: Flow) {
        let device_id = &self.inner.device_id;
        match error {
            ApiError::Blocked => {
                tracing::warn!(device_id = %device_id, ?flow, "device blocked by support");
                let notice = {
                    let mut shared = self.inner.shared.lock();
                    shared.state.block();
                    shared.notices.show_blocked(BLOCKED_NOTICE)
                };
                if let Some(handle) = self.inner.poller.lock().take() {
                    handle.abort();
                }
                self.emit(ChatEvent::StateChanged(WidgetState::Blocked));
                self.emit(ChatEvent::Notice(notice));
            }
            ApiError::RateLimited => {
                tracing::info!(device_id = %device_id, ?flow, "rate limited");
                if flow == Flow::Poll {
                    self.set_sync(SyncState::RateLimited);
                }
                self.show_transient(
                    NoticeKind::RateLimited,
                    "Too many requests. Please wait a moment.",
                );
            }
            other => {
                tracing::warn!(device_id = %device_id, ?flow, error = %other, "chat request failed");
                if flow == Flow::Poll {
                    self.set_sync(SyncState::Error);
                }
                let text = match flow {
                    Flow::Poll => "Could not refresh messages.".to_string(),
                    Flow::Send => format!("Message not sent: {other}"),
                    Flow::Page => "Could not load older messages.".to_string(),
                    Flow::Rename => format!("Could not change name: {other}"),
                };
                self.show_transient(NoticeKind::Error, text);
            }
        }
    }

    pub(crate) fn set_sync(&self, sync: SyncState) {
        let state = {
            let mut shared = self.inner.shared.lock();
            let before = shared.state;
            shared.state.set_sync(sync);
            (shared.state != before).then_some(shared.state)
        };
        if let Some(state) = state {
            self.emit(ChatEvent::StateChanged(state));
        }
    }

    pub(crate) fn show_warning(&self, warning: SoundWarning) {
        self.show_transient(NoticeKind::Warning, warning.message());
    }

    /// Show a dismissable notice and schedule its expiry.
    pub(crate) fn show_transient(&self, kind: NoticeKind, text: impl Into<String>) {
        let ttl = self.inner.config.notice_ttl;
        let Some(notice) = self.inner.shared.lock().notices.show_transient(kind, text, ttl) else {
            return;
        };
        let id = notice.id;
        self.emit(ChatEvent::Notice(notice));

        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let chat = Self { inner };
            let expired = chat.inner.shared.lock().notices.expire(id);
            if expired {
                chat.emit(ChatEvent::NoticeCleared);
            }
        });
    }
}

impl<A, S: ?Sized, P> std::fmt::Debug for GuestChat<A, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestChat")
            .field("device_id", &self.inner.device_id)
            .field("mounted", &self.inner.mounted.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
