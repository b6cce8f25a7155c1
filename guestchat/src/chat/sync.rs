//! Polling sync engine.
//!
//! A fixed-interval loop fetches everything newer than the watermark and
//! merges it into the store. Each tick's fetch runs as its own subtask in a
//! [`JoinSet`], so a slow response never delays the next tick; overlapping
//! responses are reconciled by store de-duplication. Aborting the loop task
//! drops the `JoinSet`, which aborts every in-flight fetch with it.

use std::sync::Weak;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use guestchat_proto::api::ConversationQuery;
use guestchat_proto::message::SenderType;

use super::{ChatEvent, Flow, GuestChat, Inner, SyncState};
use crate::api::{ApiError, ChatApi};
use crate::notify::SoundPlayer;
use crate::storage::ClientStorage;

impl<A, S, P> GuestChat<A, S, P>
where
    A: ChatApi + 'static,
    S: ClientStorage + ?Sized + 'static,
    P: SoundPlayer + 'static,
{
    /// Run one poll now.
    ///
    /// Before anything has been observed this loads the newest page and
    /// sets the pagination window; afterwards it fetches everything newer
    /// than the watermark. Returns the number of messages merged.
    ///
    /// Blocked or unmounted widgets do not poll and return `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of a failed fetch after it has been
    /// surfaced as a notice.
    pub async fn poll_once(&self) -> Result<usize, ApiError> {
        let query = {
            let mut shared = self.inner.shared.lock();
            if shared.state.is_blocked() || !self.is_mounted() {
                return Ok(0);
            }
            shared.state.set_sync(SyncState::Polling);
            match shared.watermark.get() {
                Some(since) => ConversationQuery::since(since),
                None => ConversationQuery::page(1, self.inner.config.page_limit),
            }
        };
        let initial = query.since.is_none();
        tracing::debug!(since = ?query.since, "polling conversation");

        let result = self
            .inner
            .api
            .fetch_conversation(&self.inner.device_id, &query)
            .await;

        if !self.is_mounted() {
            return Ok(0);
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.handle_failure(&e, Flow::Poll);
                return Err(e);
            }
        };

        let (inserted, state) = {
            let mut shared = self.inner.shared.lock();
            let inserted = shared.store.append(response.messages.iter().cloned());
            shared.watermark.advance_to_max(&response.messages);
            if initial {
                shared.pagination.update(&response.pagination);
            }
            shared.state.set_sync(SyncState::Idle);
            (inserted, shared.state)
        };

        if !inserted.is_empty() {
            tracing::debug!(count = inserted.len(), "merged polled messages");
            self.emit(ChatEvent::MessagesChanged);
        }
        self.emit(ChatEvent::StateChanged(state));

        if inserted.iter().any(|m| m.sender_type == SenderType::Admin) {
            self.notify_inbound();
        }
        Ok(inserted.len())
    }

    fn notify_inbound(&self) {
        let was_enabled = self.inner.notifier.is_enabled();
        if let Some(warning) = self.inner.notifier.play() {
            self.show_warning(warning);
        }
        let enabled = self.inner.notifier.is_enabled();
        if was_enabled != enabled {
            self.emit(ChatEvent::SoundChanged(enabled));
        }
    }
}

/// Tick every `interval` until the widget is gone, unmounted, or blocked.
///
/// Holds only a weak reference between ticks so an abandoned widget can be
/// dropped.
pub(crate) async fn poll_loop<A, S, P>(inner: Weak<Inner<A, S, P>>, interval: Duration)
where
    A: ChatApi + 'static,
    S: ClientStorage + ?Sized + 'static,
    P: SoundPlayer + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                if !inner.mounted.load(Ordering::SeqCst) || inner.shared.lock().state.is_blocked() {
                    break;
                }
                let chat = GuestChat { inner };
                in_flight.spawn(async move {
                    // Failures are surfaced as notices by poll_once.
                    let _ = chat.poll_once().await;
                });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined
                    && e.is_panic()
                {
                    tracing::error!(error = %e, "poll task panicked");
                }
            }
        }
    }
    tracing::debug!("poll loop stopped");
}
