//! Request and response bodies of the guest chat REST API.
//!
//! | Operation | Method / path |
//! |---|---|
//! | Fetch conversation | `GET` [`CONVERSATION_PATH`] |
//! | Send message | `POST` [`SEND_PATH`] |
//! | Rename device | `PATCH` [`RENAME_PATH`] |
//! | Support reply | `POST` [`ADMIN_REPLY_PATH`] |
//! | Block / unblock | `POST` [`ADMIN_BLOCK_PATH`] / [`ADMIN_UNBLOCK_PATH`] |
//!
//! Every guest endpoint identifies the caller through the [`DEVICE_ID_HEADER`].

use serde::{Deserialize, Serialize};

use crate::message::{Message, Timestamp};

/// Header carrying the anonymous device identifier.
pub const DEVICE_ID_HEADER: &str = "Device-ID";

/// Incremental / paged conversation fetch.
pub const CONVERSATION_PATH: &str = "/api/chat/guest/conversation";

/// Guest message submission.
pub const SEND_PATH: &str = "/api/chat/guest/send";

/// Device display-name change.
pub const RENAME_PATH: &str = "/api/chat/device/rename";

/// Support-side reply into a guest conversation.
pub const ADMIN_REPLY_PATH: &str = "/api/chat/admin/reply";

/// Support-side device block.
pub const ADMIN_BLOCK_PATH: &str = "/api/chat/admin/block";

/// Support-side device unblock.
pub const ADMIN_UNBLOCK_PATH: &str = "/api/chat/admin/unblock";

/// Default page size for history fetches.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Query string of a conversation fetch.
///
/// With `since` set, the server returns every message strictly newer than
/// the watermark. Without it, `page`/`limit` select a history window where
/// page 1 is the newest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationQuery {
    /// Only return messages created after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
    /// 1-based page number, newest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ConversationQuery {
    /// Query for everything newer than `since`.
    #[must_use]
    pub const fn since(since: Timestamp) -> Self {
        Self {
            since: Some(since),
            page: None,
            limit: None,
        }
    }

    /// Query for one page of history.
    #[must_use]
    pub const fn page(page: u32, limit: u32) -> Self {
        Self {
            since: None,
            page: Some(page),
            limit: Some(limit),
        }
    }
}

/// Pagination metadata returned alongside a conversation fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// The page this response covers.
    pub current_page: u32,
    /// Page size used.
    pub limit: u32,
    /// Number of pages available.
    pub total_pages: u32,
}

/// Response body of a conversation fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationResponse {
    /// Messages ordered oldest first.
    pub messages: Vec<Message>,
    /// Window metadata.
    pub pagination: Pagination,
}

/// Who a guest message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    /// Support staff; the only recipient a guest can address.
    Admin,
}

/// Request body of a guest send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Message text.
    pub content: String,
    /// Always [`RecipientType::Admin`] for guests.
    pub recipient_type: RecipientType,
}

impl SendRequest {
    /// Builds a send request addressed to support.
    pub fn to_admin(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            recipient_type: RecipientType::Admin,
        }
    }
}

/// Request body of a device rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    /// Device being renamed; must match the `Device-ID` header.
    pub device_id: String,
    /// New display name.
    pub new_name: String,
}

/// Response body of a device rename.
///
/// The server may answer with an empty object or with the updated record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenameResponse {
    /// Device identifier, when echoed back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Stored display name, when echoed back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request body of a support reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReplyRequest {
    /// Conversation (device) to reply into.
    pub device_id: String,
    /// Reply text.
    pub content: String,
    /// Display name of the replying agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// Request body of the block / unblock endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    /// Target device.
    pub device_id: String,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub error: String,
}
