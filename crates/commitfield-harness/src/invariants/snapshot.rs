//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use commitfield_app::App;
use commitfield_core::{DeliveryState, RoomId, UserId};
use serde::Serialize;

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
    /// No work is in flight: every send has settled one way or the other.
    pub quiescent: bool,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client], quiescent: false }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients, quiescent: false }
    }

    /// Mark the snapshot as taken after all work settled.
    #[must_use]
    pub fn settled(mut self) -> Self {
        self.quiescent = true;
        self
    }
}

/// Snapshot of one client's observable state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientSnapshot {
    /// User the client acts as.
    pub id: UserId,
    /// Transports currently open for this user.
    pub live_transports: usize,
    /// Most transports ever open at once for this user.
    pub peak_transports: usize,
    /// Room shown. `None` while the room list is shown.
    pub open_room: Option<RoomId>,
    /// Messages of the open room, in display order.
    pub messages: Vec<MessageSnapshot>,
}

impl ClientSnapshot {
    /// Create a new client snapshot.
    pub fn new(id: UserId) -> Self {
        Self { id, ..Default::default() }
    }

    /// Capture the open room of `app`.
    pub fn from_app(app: &App) -> Self {
        let mut snapshot = Self::new(app.me());
        if let Some(room) = app.room() {
            snapshot.open_room = Some(room.room_id());
            snapshot.messages = room
                .messages()
                .iter()
                .map(|m| MessageSnapshot {
                    id: m.id.to_string(),
                    room_id: m.room_id,
                    body: m.body.clone(),
                    delivery: m.delivery,
                })
                .collect();
        }
        snapshot
    }

    /// Set transport counts, usually read from the sim server.
    #[must_use]
    pub fn with_transports(mut self, live: usize, peak: usize) -> Self {
        self.live_transports = live;
        self.peak_transports = peak;
        self
    }

    /// Add a message to the snapshot.
    #[must_use]
    pub fn with_message(mut self, message: MessageSnapshot) -> Self {
        self.messages.push(message);
        self
    }
}

/// Snapshot of one displayed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSnapshot {
    /// Server id or placeholder id.
    pub id: String,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Message body.
    pub body: String,
    /// Delivery state.
    pub delivery: DeliveryState,
}

impl MessageSnapshot {
    /// Whether the id is a local placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(commitfield_core::message::LOCAL_ID_PREFIX)
    }
}
