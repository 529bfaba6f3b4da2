//! Per-room ordered message list.
//!
//! Insertion applies the deduplication rules:
//!
//! 1. a message whose server id is already present is discarded
//! 2. otherwise the oldest optimistic placeholder with the same room, sender
//!    and body is removed and the incoming message is appended at the end
//! 3. otherwise the message is appended
//!
//! # Invariants
//!
//! - At most one entry per server-assigned id.
//! - A placeholder and its confirmed echo never coexist.

use std::collections::HashSet;

use crate::{
    RoomId,
    message::{ChatMessage, DeliveryState, MessageId},
};

/// Result of [`MessageList::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New entry appended.
    Appended,
    /// Server id already present. Discarded.
    Duplicate,
    /// Replaced the optimistic entry `placeholder`.
    Confirmed {
        /// Placeholder id that was replaced.
        placeholder: MessageId,
    },
}

/// Ordered messages of one room.
#[derive(Debug, Clone, Default)]
pub struct MessageList {
    messages: Vec<ChatMessage>,
    server_ids: HashSet<MessageId>,
}

impl MessageList {
    /// Empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// List seeded from cached or fetched messages. Duplicates are dropped.
    pub fn from_messages(messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        let mut list = Self::new();
        for msg in messages {
            list.insert(msg);
        }
        list
    }

    /// Insert a confirmed message received from the server.
    pub fn insert(&mut self, msg: ChatMessage) -> InsertOutcome {
        if !msg.id.is_placeholder() && self.server_ids.contains(&msg.id) {
            return InsertOutcome::Duplicate;
        }

        if let Some(pos) = self.messages.iter().position(|m| m.is_echoed_by(&msg)) {
            let placeholder = self.messages.remove(pos).id;
            self.append(msg);
            return InsertOutcome::Confirmed { placeholder };
        }

        self.append(msg);
        InsertOutcome::Appended
    }

    /// Append a locally composed optimistic message.
    pub fn push_optimistic(&mut self, msg: ChatMessage) {
        debug_assert!(msg.id.is_placeholder());
        self.messages.push(msg);
    }

    /// Mark the placeholder `id` as failed. Returns false if it is gone.
    pub fn mark_failed(&mut self, id: &MessageId) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == id) {
            Some(msg) if msg.delivery == DeliveryState::Optimistic => {
                msg.delivery = DeliveryState::Failed;
                true
            },
            _ => false,
        }
    }

    /// Prepend an older page. Entries already present are skipped. Returns
    /// the number of entries added.
    pub fn prepend_older(&mut self, older: Vec<ChatMessage>) -> usize {
        let mut fresh = Vec::with_capacity(older.len());
        for msg in older {
            if msg.id.is_placeholder() || self.server_ids.insert(msg.id.clone()) {
                fresh.push(msg);
            }
        }

        let added = fresh.len();
        fresh.append(&mut self.messages);
        self.messages = fresh;
        added
    }

    /// Replace the contents with the newest page from the server.
    ///
    /// Entries not covered by the page survive: optimistic and failed
    /// placeholders, and server messages newer than the page's last entry.
    pub fn reconcile(&mut self, page: Vec<ChatMessage>) {
        let newest = page.last().map(|m| m.sent_at);
        let previous = std::mem::take(&mut self.messages);
        self.server_ids.clear();

        for msg in page {
            self.insert(msg);
        }

        for msg in previous {
            let keep = msg.id.is_placeholder()
                || newest.is_none_or(|newest| msg.sent_at > newest);
            if !keep {
                continue;
            }

            if msg.id.is_placeholder() {
                let confirmed = self.messages.iter().any(|m| {
                    !m.id.is_placeholder()
                        && m.room_id == msg.room_id
                        && m.sender_id == msg.sender_id
                        && m.body == msg.body
                        && m.sent_at >= msg.sent_at
                });
                if !confirmed {
                    self.messages.push(msg);
                }
            } else {
                self.insert(msg);
            }
        }
    }

    /// Server id of the oldest confirmed message, the pagination cursor.
    pub fn oldest_server_id(&self) -> Option<&MessageId> {
        self.messages.iter().find(|m| !m.id.is_placeholder()).map(|m| &m.id)
    }

    /// Newest entry.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Up to `n` newest entries, oldest first.
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        &self.messages[self.messages.len().saturating_sub(n)..]
    }

    /// Entries for `room_id` only.
    pub fn for_room(&self, room_id: RoomId) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(move |m| m.room_id == room_id)
    }

    /// Check the server-id uniqueness invariant.
    pub fn has_unique_server_ids(&self) -> bool {
        let mut seen = HashSet::new();
        self.messages.iter().filter(|m| !m.id.is_placeholder()).all(|m| seen.insert(&m.id))
    }

    /// All entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// All entries as a slice.
    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// No entries.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn append(&mut self, msg: ChatMessage) {
        if !msg.id.is_placeholder() {
            self.server_ids.insert(msg.id.clone());
        }
        self.messages.push(msg);
    }
}
