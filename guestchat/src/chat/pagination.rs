//! Loading older history, page by page.
//!
//! Page 1 is the newest page and is loaded on mount. Each further page is
//! older; pages are merged through the same de-duplicating store as live
//! polling and never move the watermark.

use guestchat_proto::api::{ConversationQuery, Pagination};

use super::{ChatEvent, Flow, GuestChat};
use crate::api::{ApiError, ChatApi};
use crate::notify::SoundPlayer;
use crate::storage::ClientStorage;

/// The loaded window of older messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    /// Highest page loaded so far (1 = newest).
    pub page: u32,
    /// Messages per page.
    pub limit: u32,
    /// Pages available on the server.
    pub total_pages: u32,
}

impl PaginationState {
    /// Nothing loaded beyond the first page yet.
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit,
            total_pages: 1,
        }
    }

    /// Whether an older page exists.
    #[must_use]
    pub const fn has_older(&self) -> bool {
        self.page < self.total_pages
    }

    /// The page to request next, if any.
    #[must_use]
    pub const fn next_page(&self) -> Option<u32> {
        if self.has_older() {
            Some(self.page + 1)
        } else {
            None
        }
    }

    /// Adopt the server's view after a page fetch.
    ///
    /// The loaded page never goes backwards, and the server's limit is
    /// kept only if it is usable.
    pub fn update(&mut self, server: &Pagination) {
        self.page = self.page.max(server.current_page.max(1));
        self.total_pages = server.total_pages.max(1);
        if server.limit > 0 {
            self.limit = server.limit;
        }
    }
}

/// Errors from [`GuestChat::load_older_page`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// The device is blocked.
    #[error("device is blocked")]
    Blocked,

    /// The fetch failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl<A, S, P> GuestChat<A, S, P>
where
    A: ChatApi + 'static,
    S: ClientStorage + ?Sized + 'static,
    P: SoundPlayer + 'static,
{
    /// Whether an older page can be loaded.
    #[must_use]
    pub fn has_older(&self) -> bool {
        self.inner.shared.lock().pagination.has_older()
    }

    /// Load the next older page and merge it at the head of the list.
    ///
    /// A no-op returning `Ok(0)` when every page is already loaded or the
    /// widget is unmounted. Returns the number of messages merged.
    ///
    /// # Errors
    ///
    /// - [`PageError::Blocked`] without a network call once blocked.
    /// - [`PageError::Api`] if the fetch fails; the failure is also shown
    ///   as a notice.
    pub async fn load_older_page(&self) -> Result<usize, PageError> {
        let query = {
            let shared = self.inner.shared.lock();
            if shared.state.is_blocked() {
                return Err(PageError::Blocked);
            }
            let Some(next) = shared.pagination.next_page() else {
                return Ok(0);
            };
            ConversationQuery::page(next, shared.pagination.limit)
        };
        if !self.is_mounted() {
            return Ok(0);
        }
        tracing::debug!(page = ?query.page, "loading older page");

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
                self.handle_failure(&e, Flow::Page);
                return Err(if e == ApiError::Blocked {
                    PageError::Blocked
                } else {
                    PageError::Api(e)
                });
            }
        };

        let inserted = {
            let mut shared = self.inner.shared.lock();
            let inserted = shared.store.prepend_older(response.messages);
            shared.pagination.update(&response.pagination);
            inserted.len()
        };
        self.emit(ChatEvent::MessagesChanged);
        Ok(inserted)
    }
}
