//! Backend collaborator abstraction for the guest chat.
//!
//! Defines the [`ChatApi`] trait the widget talks to. Implementations:
//! - [`http::HttpChatApi`] -- the REST backend over `reqwest`
//! - [`scripted::ScriptedApi`] -- in-process scripted responses for testing

pub mod http;
pub mod scripted;

use guestchat_proto::api::{
    ConversationQuery, ConversationResponse, RenameRequest, RenameResponse, SendRequest,
};
use guestchat_proto::message::Message;

/// Errors returned by backend calls.
///
/// The variants mirror how the widget reacts: [`Blocked`](Self::Blocked) is
/// fatal for the session, [`RateLimited`](Self::RateLimited) is a transient
/// warning, everything else is a recoverable failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// HTTP 403: this device has been blocked by support.
    #[error("this device has been blocked")]
    Blocked,

    /// HTTP 429: too many requests.
    #[error("too many requests, slow down")]
    RateLimited,

    /// Any other non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Reason from the error body, or the canonical reason phrase.
        message: String,
    },

    /// The request did not complete within the client timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            403 => Self::Blocked,
            429 => Self::RateLimited,
            _ => Self::Status {
                status,
                message: message.into(),
            },
        }
    }
}

/// Async client for the guest chat REST API.
///
/// Every call identifies the caller by `device_id`, sent as the
/// `Device-ID` header.
pub trait ChatApi: Send + Sync {
    /// Fetch messages newer than a watermark or one page of history.
    fn fetch_conversation(
        &self,
        device_id: &str,
        query: &ConversationQuery,
    ) -> impl std::future::Future<Output = Result<ConversationResponse, ApiError>> + Send;

    /// Submit a guest message and return the server-confirmed record.
    fn send_message(
        &self,
        device_id: &str,
        request: &SendRequest,
    ) -> impl std::future::Future<Output = Result<Message, ApiError>> + Send;

    /// Change this device's display name.
    fn rename_device(
        &self,
        device_id: &str,
        request: &RenameRequest,
    ) -> impl std::future::Future<Output = Result<RenameResponse, ApiError>> + Send;
}
