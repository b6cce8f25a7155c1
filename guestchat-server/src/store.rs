//! In-memory conversation store, one conversation per guest device.
//!
//! Messages are kept oldest first. Creation timestamps are strictly
//! increasing within a conversation (bumped by a millisecond on collision),
//! so clients can use `createdAt` as a unique key and `since` as an
//! exclusive watermark.

use std::collections::HashMap;

use guestchat_proto::api::Pagination;
use guestchat_proto::message::{Message, MessageId, SenderType, Timestamp};
use tokio::sync::RwLock;

/// Sender name used for support replies that do not name an agent.
pub const DEFAULT_SUPPORT_NAME: &str = "Support";

/// Sender name used for devices that never registered a name.
pub const DEFAULT_GUEST_NAME: &str = "Guest";

#[derive(Debug, Default)]
struct Conversation {
    messages: Vec<Message>,
    name: Option<String>,
    blocked: bool,
}

impl Conversation {
    fn next_timestamp(&self) -> Timestamp {
        let now = Timestamp::now();
        match self.messages.last() {
            Some(last) if now <= last.created_at => last.created_at.plus_millis(1),
            _ => now,
        }
    }
}

/// Thread-safe store of all guest conversations.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl ConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to `device_id`'s conversation and returns it.
    ///
    /// Guest messages carry the device's registered name; support messages
    /// carry `sender_name` or [`DEFAULT_SUPPORT_NAME`].
    pub async fn append(
        &self,
        device_id: &str,
        sender_type: SenderType,
        sender_name: Option<String>,
        content: &str,
    ) -> Message {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations.entry(device_id.to_string()).or_default();
        let sender_name = match sender_type {
            SenderType::Guest => conversation
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_GUEST_NAME.to_string()),
            SenderType::Admin => sender_name.unwrap_or_else(|| DEFAULT_SUPPORT_NAME.to_string()),
        };
        let message = Message {
            id: MessageId::new(uuid::Uuid::now_v7().to_string()),
            content: content.to_string(),
            sender_type,
            sender_name,
            created_at: conversation.next_timestamp(),
            read: false,
        };
        conversation.messages.push(message.clone());
        drop(conversations);
        message
    }

    /// All messages strictly newer than `since`, oldest first.
    pub async fn since(&self, device_id: &str, since: Timestamp) -> Vec<Message> {
        let conversations = self.conversations.read().await;
        conversations.get(device_id).map_or_else(Vec::new, |c| {
            let start = c.messages.partition_point(|m| m.created_at <= since);
            c.messages[start..].to_vec()
        })
    }

    /// One page of history. Page 1 holds the newest `limit` messages; each
    /// page is returned oldest first.
    ///
    /// `page` and `limit` are clamped to at least 1.
    pub async fn page(&self, device_id: &str, page: u32, limit: u32) -> (Vec<Message>, Pagination) {
        let page = page.max(1);
        let limit = limit.max(1);
        let conversations = self.conversations.read().await;
        let messages = conversations
            .get(device_id)
            .map_or(&[][..], |c| c.messages.as_slice());

        let total = messages.len();
        let per_page = limit as usize;
        let total_pages = u32::try_from(total.div_ceil(per_page))
            .unwrap_or(u32::MAX)
            .max(1);

        let skip = (page as usize - 1).saturating_mul(per_page);
        let end = total.saturating_sub(skip);
        let start = end.saturating_sub(per_page);
        let window = messages[start..end].to_vec();
        drop(conversations);

        (
            window,
            Pagination {
                current_page: page,
                limit,
                total_pages,
            },
        )
    }

    /// Records `name` as the display name of `device_id`.
    pub async fn rename(&self, device_id: &str, name: &str) {
        let mut conversations = self.conversations.write().await;
        conversations.entry(device_id.to_string()).or_default().name = Some(name.to_string());
    }

    /// The registered display name of `device_id`, if any.
    pub async fn device_name(&self, device_id: &str) -> Option<String> {
        let conversations = self.conversations.read().await;
        conversations.get(device_id).and_then(|c| c.name.clone())
    }

    /// Block or unblock `device_id`.
    pub async fn set_blocked(&self, device_id: &str, blocked: bool) {
        let mut conversations = self.conversations.write().await;
        conversations.entry(device_id.to_string()).or_default().blocked = blocked;
    }

    /// Whether `device_id` is blocked.
    pub async fn is_blocked(&self, device_id: &str) -> bool {
        let conversations = self.conversations.read().await;
        conversations.get(device_id).is_some_and(|c| c.blocked)
    }
}
