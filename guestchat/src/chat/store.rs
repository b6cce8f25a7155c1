//! Ordered, de-duplicated in-memory message list.
//!
//! Three independent flows mutate the list (polling, sending, pagination)
//! and their completions can arrive in any order. They all go through the
//! same merge discipline here, so the list stays sorted by `createdAt` and
//! never holds two confirmed messages with the same timestamp.
//!
//! De-duplication keys on `createdAt` alone. Two genuine messages created
//! in the same millisecond would collide; the backend guarantees strictly
//! increasing timestamps per conversation, which makes that impossible for
//! a single guest.

use std::collections::HashSet;

use guestchat_proto::message::{Message, MessageId, Timestamp};

/// The widget's message list, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    /// `createdAt` of every confirmed (non-temporary) entry.
    confirmed: HashSet<Timestamp>,
}

impl MessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages, temporary ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Merge a batch of confirmed messages.
    ///
    /// Messages whose `createdAt` is already present are skipped, including
    /// repeats inside the batch itself. Returns the messages that were
    /// actually inserted, in batch order.
    pub fn append(&mut self, batch: impl IntoIterator<Item = Message>) -> Vec<Message> {
        let mut inserted = Vec::new();
        for msg in batch {
            if self.confirmed.contains(&msg.created_at) {
                continue;
            }
            self.confirmed.insert(msg.created_at);
            self.insert_sorted(msg.clone());
            inserted.push(msg);
        }
        inserted
    }

    /// Merge a page of older history.
    ///
    /// Same discipline as [`append`](Self::append); older messages simply
    /// sort to the head of the list.
    pub fn prepend_older(&mut self, batch: impl IntoIterator<Item = Message>) -> Vec<Message> {
        self.append(batch)
    }

    /// Insert an optimistic, not yet confirmed message.
    pub fn push_temp(&mut self, msg: Message) {
        debug_assert!(msg.is_temp(), "push_temp expects a temporary message");
        self.insert_sorted(msg);
    }

    /// Swap the temporary entry `temp_id` for its confirmed counterpart.
    ///
    /// The confirmed message takes the temporary entry's slot. If a poll
    /// already delivered the confirmed message, the temporary entry is just
    /// dropped. If the temporary entry is gone, the confirmed message is
    /// merged normally. Returns `true` if an in-place swap happened.
    pub fn replace_temp(&mut self, temp_id: &MessageId, confirmed: Message) -> bool {
        let Some(pos) = self.position(temp_id) else {
            self.append([confirmed]);
            return false;
        };

        if self.confirmed.contains(&confirmed.created_at) {
            self.messages.remove(pos);
            return false;
        }

        self.confirmed.insert(confirmed.created_at);
        self.messages[pos] = confirmed;
        if !self.is_ordered_at(pos) {
            let msg = self.messages.remove(pos);
            self.insert_sorted(msg);
        }
        true
    }

    /// Remove the temporary entry `temp_id` (send rollback).
    ///
    /// Confirmed messages are never removed. Returns the removed entry.
    pub fn remove_temp(&mut self, temp_id: &MessageId) -> Option<Message> {
        if !temp_id.is_temp() {
            return None;
        }
        let pos = self.position(temp_id)?;
        Some(self.messages.remove(pos))
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    fn insert_sorted(&mut self, msg: Message) {
        let at = self
            .messages
            .partition_point(|m| m.created_at <= msg.created_at);
        self.messages.insert(at, msg);
    }

    fn is_ordered_at(&self, pos: usize) -> bool {
        let ts = self.messages[pos].created_at;
        let after_prev = pos == 0 || self.messages[pos - 1].created_at <= ts;
        let before_next = self
            .messages
            .get(pos + 1)
            .is_none_or(|next| ts <= next.created_at);
        after_prev && before_next
    }
}

/// The `createdAt` of the last message this client has observed.
///
/// Only ever moves forward; used as the `since` of the next poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncWatermark(Option<Timestamp>);

impl SyncWatermark {
    /// A watermark that has observed nothing yet.
    #[must_use]
    pub const fn new() -> Self {
        Self(None)
    }

    /// Current value.
    #[must_use]
    pub const fn get(&self) -> Option<Timestamp> {
        self.0
    }

    /// Move forward to `ts` if it is newer. Returns whether it moved.
    pub fn advance(&mut self, ts: Timestamp) -> bool {
        if self.0.is_some_and(|current| current >= ts) {
            return false;
        }
        self.0 = Some(ts);
        true
    }

    /// Move forward to the newest timestamp in `batch`.
    pub fn advance_to_max<'a>(&mut self, batch: impl IntoIterator<Item = &'a Message>) -> bool {
        batch
            .into_iter()
            .map(|m| m.created_at)
            .max()
            .is_some_and(|max| self.advance(max))
    }
}
