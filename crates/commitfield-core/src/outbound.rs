//! Outbound chat queue.
//!
//! Holds chats composed while the transport is not open and releases them
//! strictly in submission order when it reopens. The queue is bounded: past
//! `capacity` the oldest chat is evicted and handed back to the caller, so a
//! long outage cannot grow memory without limit.
//!
//! Chats written to a transport stay tracked as in flight until the broker
//! echoes them. When that transport dies first, [`OutboundQueue::requeue_in_flight`]
//! puts them back at the head so they are written again on the next open.
//!
//! Room subscriptions are not queued here: the subscription registry keeps
//! the intent and replays it on every open.

use std::collections::VecDeque;

use commitfield_proto::{ClientFrame, OutboundChat};

use crate::{RoomId, message::MessageId};

/// Default queue bound.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Chat send awaiting the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChat {
    /// Placeholder id of the optimistic message this send confirms.
    pub local_id: MessageId,
    /// Frame to write.
    pub frame: OutboundChat,
}

impl PendingChat {
    /// Wire frame for this send.
    pub fn to_client_frame(&self) -> ClientFrame {
        ClientFrame::Chat(self.frame.clone())
    }

    /// Target room.
    pub fn room_id(&self) -> RoomId {
        self.frame.room_id
    }
}

/// Bounded FIFO of pending chats plus the chats awaiting their echo.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    queued: VecDeque<PendingChat>,
    in_flight: VecDeque<PendingChat>,
    capacity: usize,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_CAPACITY)
    }
}

impl OutboundQueue {
    /// Empty queue holding at most `capacity` chats. A zero capacity is
    /// raised to one.
    pub fn new(capacity: usize) -> Self {
        Self { queued: VecDeque::new(), in_flight: VecDeque::new(), capacity: capacity.max(1) }
    }

    /// Append a chat. Returns the evicted oldest chat when full.
    pub fn push(&mut self, chat: PendingChat) -> Option<PendingChat> {
        let evicted =
            if self.queued.len() >= self.capacity { self.queued.pop_front() } else { None };

        if let Some(old) = &evicted {
            tracing::warn!(
                capacity = self.capacity,
                local_id = %old.local_id,
                "outbound queue full, dropping oldest"
            );
        }

        self.queued.push_back(chat);
        evicted
    }

    /// Remove every queued chat in submission order.
    pub fn drain(&mut self) -> Vec<PendingChat> {
        self.queued.drain(..).collect()
    }

    /// Put unsent chats back at the head, ahead of anything queued since.
    ///
    /// `unsent` must be in submission order. A chat already queued is not
    /// queued twice. Returns chats evicted to respect the bound, oldest first.
    pub fn requeue_front(&mut self, unsent: Vec<PendingChat>) -> Vec<PendingChat> {
        for chat in unsent.into_iter().rev() {
            if self.queued.iter().any(|q| q.local_id == chat.local_id) {
                continue;
            }
            self.queued.push_front(chat);
        }

        let mut evicted = Vec::new();
        while self.queued.len() > self.capacity {
            if let Some(chat) = self.queued.pop_front() {
                evicted.push(chat);
            }
        }
        evicted
    }

    /// Record a chat handed to the transport.
    ///
    /// Tracking is bounded like the queue. Past the bound the oldest entry
    /// is forgotten, as it is the one most likely delivered.
    pub fn written(&mut self, chat: PendingChat) {
        if self.in_flight.len() >= self.capacity
            && let Some(old) = self.in_flight.pop_front()
        {
            tracing::debug!(local_id = %old.local_id, "no longer tracking unechoed chat");
        }
        self.in_flight.push_back(chat);
    }

    /// The transport refused these chats. Stop tracking them as written.
    pub fn not_written(&mut self, chats: &[PendingChat]) {
        self.in_flight.retain(|c| chats.iter().all(|u| u.local_id != c.local_id));
    }

    /// Broker echoed our chat in `room_id` with `body`. Returns the oldest
    /// matching in-flight send.
    pub fn confirm(&mut self, room_id: RoomId, body: &str) -> Option<PendingChat> {
        let pos =
            self.in_flight.iter().position(|c| c.room_id() == room_id && c.frame.message == body)?;
        self.in_flight.remove(pos)
    }

    /// The transport died with chats unechoed. Move them back to the head of
    /// the queue in write order. Returns chats evicted by the bound.
    pub fn requeue_in_flight(&mut self) -> Vec<PendingChat> {
        let in_flight: Vec<_> = self.in_flight.drain(..).collect();
        if in_flight.is_empty() {
            return Vec::new();
        }
        tracing::debug!(count = in_flight.len(), "requeueing unechoed chats");
        self.requeue_front(in_flight)
    }

    /// Discard everything, in flight first, then queued. Returns the chats
    /// in submission order.
    pub fn clear(&mut self) -> Vec<PendingChat> {
        let mut all: Vec<_> = self.in_flight.drain(..).collect();
        all.extend(self.queued.drain(..));
        all
    }

    /// Queued chats in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingChat> {
        self.queued.iter()
    }

    /// Queued chat count.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Nothing queued.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Chats written but not yet echoed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Maximum queued chats.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
