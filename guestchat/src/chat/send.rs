//! Optimistic send pipeline.
//!
//! 1. Validate and claim the single send slot.
//! 2. Insert a `temp-<millis>` message so the UI shows it immediately.
//! 3. POST it to the backend.
//! 4. On success swap in the confirmed record and advance the watermark;
//!    on failure roll the temporary entry back.
//!
//! The slot and the temporary entry are owned by a [`SendGuard`]. Dropping
//! the guard without confirming rolls back, so an error, a panic, or the
//! caller dropping the future all leave the store clean and the slot free.

use std::sync::atomic::Ordering;

use guestchat_proto::api::SendRequest;
use guestchat_proto::message::{
    Message, MessageId, SenderType, Timestamp, ValidationError, validate_content,
};

use super::state::SendRejection;
use super::{ChatEvent, Flow, GuestChat, Inner, NoticeKind};
use crate::api::{ApiError, ChatApi};
use crate::notify::SoundPlayer;
use crate::storage::ClientStorage;

/// Errors that can occur when sending a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The content is empty after trimming or too long.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another send is still in flight.
    #[error("a message is already being sent")]
    Busy,

    /// The device is blocked.
    #[error("device is blocked")]
    Blocked,

    /// The backend call failed; the message was rolled back.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<SendRejection> for SendError {
    fn from(rejection: SendRejection) -> Self {
        match rejection {
            SendRejection::Blocked => Self::Blocked,
            SendRejection::Busy => Self::Busy,
        }
    }
}

/// Owns the send slot and the temporary entry of one send.
struct SendGuard<'a, A, S: ?Sized, P> {
    inner: &'a Inner<A, S, P>,
    temp_id: Option<MessageId>,
}

impl<A, S: ?Sized, P> SendGuard<'_, A, S, P> {
    /// Swap in the confirmed message and release the slot.
    fn confirm(mut self, confirmed: Message) {
        let Some(temp_id) = self.temp_id.take() else {
            return;
        };
        let mut shared = self.inner.shared.lock();
        shared.watermark.advance(confirmed.created_at);
        shared.store.replace_temp(&temp_id, confirmed);
        // Drop releases the slot.
    }
}

impl<A, S: ?Sized, P> Drop for SendGuard<'_, A, S, P> {
    fn drop(&mut self) {
        let rolled_back = {
            let mut shared = self.inner.shared.lock();
            shared.state.end_send();
            self.temp_id
                .take()
                .and_then(|id| shared.store.remove_temp(&id))
                .is_some()
        };
        if rolled_back {
            tracing::debug!("rolled back optimistic message");
        }
        if self.inner.mounted.load(Ordering::SeqCst) {
            let _ = self.inner.events.try_send(ChatEvent::MessagesChanged);
            let state = self.inner.shared.lock().state;
            let _ = self.inner.events.try_send(ChatEvent::StateChanged(state));
        }
    }
}

impl<A, S, P> GuestChat<A, S, P>
where
    A: ChatApi + 'static,
    S: ClientStorage + ?Sized + 'static,
    P: SoundPlayer + 'static,
{
    /// Whether a send is in flight.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.inner.shared.lock().state.is_sending()
    }

    /// Send `content` to support.
    ///
    /// The message appears in the list immediately and is replaced by the
    /// server's record once confirmed. Returns the confirmed message.
    ///
    /// # Errors
    ///
    /// Rejected without a network call:
    /// - [`SendError::Validation`] for empty or oversized content.
    /// - [`SendError::Busy`] while another send is in flight.
    /// - [`SendError::Blocked`] once the device is blocked.
    ///
    /// After a network call, [`SendError::Blocked`] or [`SendError::Api`];
    /// the optimistic message has been removed and the failure is shown as
    /// a notice.
    pub async fn send(&self, content: &str) -> Result<Message, SendError> {
        let content = match validate_content(content) {
            Ok(trimmed) => trimmed.to_string(),
            Err(e) => {
                // Blank input is just ignored.
                if e != ValidationError::EmptyContent {
                    self.show_transient(NoticeKind::Error, format!("Message not sent: {e}"));
                }
                return Err(e.into());
            }
        };

        let guard = {
            let mut shared = self.inner.shared.lock();
            shared.state.begin_send()?;
            let now = Timestamp::now();
            let temp = Message {
                id: MessageId::temp(now),
                content: content.clone(),
                sender_type: SenderType::Guest,
                sender_name: shared.device_name.clone(),
                created_at: now,
                read: false,
            };
            let temp_id = temp.id.clone();
            shared.store.push_temp(temp);
            SendGuard {
                inner: &*self.inner,
                temp_id: Some(temp_id),
            }
        };
        self.emit(ChatEvent::MessagesChanged);
        self.emit(ChatEvent::StateChanged(self.state()));

        let result = self
            .inner
            .api
            .send_message(&self.inner.device_id, &SendRequest::to_admin(content))
            .await;

        if !self.is_mounted() {
            drop(guard);
            return result.map_err(SendError::from);
        }

        match result {
            Ok(confirmed) => {
                tracing::debug!(message_id = %confirmed.id, "message confirmed");
                guard.confirm(confirmed.clone());
                Ok(confirmed)
            }
            Err(e) => {
                drop(guard);
                self.handle_failure(&e, Flow::Send);
                Err(if e == ApiError::Blocked {
                    SendError::Blocked
                } else {
                    SendError::Api(e)
                })
            }
        }
    }
}
