//! Scripted in-process [`ChatApi`] for testing.
//!
//! Responses are queued per operation and consumed in FIFO order. When a
//! queue is empty the API answers with a benign default: an empty
//! conversation, an echoed confirmation, or an empty rename response.
//! Every call is recorded so tests can assert on what was (or was not)
//! sent over the wire.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use guestchat_proto::api::{
    ConversationQuery, ConversationResponse, DEFAULT_PAGE_LIMIT, Pagination, RenameRequest,
    RenameResponse, SendRequest,
};
use guestchat_proto::message::{Message, MessageId, SenderType, Timestamp};

use super::{ApiError, ChatApi};

/// A call observed by [`ScriptedApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// `fetch_conversation` with the query that was used.
    Fetch {
        /// Device header value.
        device_id: String,
        /// Query string.
        query: ConversationQuery,
    },
    /// `send_message` with the request body.
    Send {
        /// Device header value.
        device_id: String,
        /// Request body.
        request: SendRequest,
    },
    /// `rename_device` with the request body.
    Rename {
        /// Device header value.
        device_id: String,
        /// Request body.
        request: RenameRequest,
    },
}

/// In-process [`ChatApi`] driven by queued responses.
#[derive(Debug, Default)]
pub struct ScriptedApi {
    fetches: Mutex<VecDeque<Result<ConversationResponse, ApiError>>>,
    sends: Mutex<VecDeque<Result<Message, ApiError>>>,
    renames: Mutex<VecDeque<Result<RenameResponse, ApiError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    send_delay: Mutex<Option<Duration>>,
    fetch_delay: Mutex<Option<Duration>>,
    next_id: AtomicU64,
}

impl ScriptedApi {
    /// Create an API with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next conversation fetch.
    pub fn push_fetch(&self, result: Result<ConversationResponse, ApiError>) {
        self.fetches.lock().push_back(result);
    }

    /// Queue a successful fetch returning `messages` as a single page.
    pub fn push_messages(&self, messages: Vec<Message>) {
        self.push_fetch(Ok(single_page(messages)));
    }

    /// Queue the result of the next send.
    pub fn push_send(&self, result: Result<Message, ApiError>) {
        self.sends.lock().push_back(result);
    }

    /// Queue the result of the next rename.
    pub fn push_rename(&self, result: Result<RenameResponse, ApiError>) {
        self.renames.lock().push_back(result);
    }

    /// Delay every send by `delay` before answering.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock() = Some(delay);
    }

    /// Delay every fetch by `delay` before answering.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    /// All calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of fetches issued so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::Fetch { .. }))
    }

    /// Number of sends issued so far.
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::Send { .. }))
    }

    /// Number of renames issued so far.
    #[must_use]
    pub fn rename_count(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::Rename { .. }))
    }

    /// The query of the most recent fetch.
    #[must_use]
    pub fn last_fetch_query(&self) -> Option<ConversationQuery> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            RecordedCall::Fetch { query, .. } => Some(query.clone()),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&RecordedCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn echo(&self, request: &SendRequest) -> Message {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Message {
            id: MessageId::new(format!("srv-{n}")),
            content: request.content.clone(),
            sender_type: SenderType::Guest,
            sender_name: "Guest".to_string(),
            created_at: Timestamp::now(),
            read: false,
        }
    }
}

/// Wrap `messages` in a one-page conversation response.
#[must_use]
pub fn single_page(messages: Vec<Message>) -> ConversationResponse {
    ConversationResponse {
        messages,
        pagination: Pagination {
            current_page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            total_pages: 1,
        },
    }
}

impl ChatApi for ScriptedApi {
    async fn fetch_conversation(
        &self,
        device_id: &str,
        query: &ConversationQuery,
    ) -> Result<ConversationResponse, ApiError> {
        self.calls.lock().push(RecordedCall::Fetch {
            device_id: device_id.to_string(),
            query: query.clone(),
        });
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.fetches.lock().pop_front();
        next.unwrap_or_else(|| Ok(single_page(Vec::new())))
    }

    async fn send_message(&self, device_id: &str, request: &SendRequest) -> Result<Message, ApiError> {
        self.calls.lock().push(RecordedCall::Send {
            device_id: device_id.to_string(),
            request: request.clone(),
        });
        let delay = *self.send_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.sends.lock().pop_front();
        next.unwrap_or_else(|| Ok(self.echo(request)))
    }

    async fn rename_device(
        &self,
        device_id: &str,
        request: &RenameRequest,
    ) -> Result<RenameResponse, ApiError> {
        self.calls.lock().push(RecordedCall::Rename {
            device_id: device_id.to_string(),
            request: request.clone(),
        });
        let next = self.renames.lock().pop_front();
        next.unwrap_or_else(|| Ok(RenameResponse::default()))
    }
}
