//! Client events and actions.

use std::time::Duration;

use commitfield_core::{
    ChatMessage, ConnectionState, MessageId, RoomId, connection::ConnectionStatus,
    outbound::PendingChat,
};
use commitfield_proto::{ClientFrame, CommitCountWire, NotificationWire};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Opening and closing transports when asked, and reporting their events
/// - Driving time forward via ticks
/// - Forwarding application intents (subscribe, send, disconnect)
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Application wants a connection.
    Connect,

    /// Application wants to close the connection and forget every room.
    Disconnect,

    /// Transport opened.
    TransportOpened {
        /// Generation from the `OpenTransport` action.
        generation: u64,
    },

    /// Transport closed or errored.
    TransportClosed {
        /// Generation of the transport.
        generation: u64,
    },

    /// Text frame received.
    TextReceived {
        /// Generation of the transport.
        generation: u64,
        /// Frame text.
        text: String,
    },

    /// Time tick for reconnect timing.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// Follow a room's live messages.
    SubscribeRoom {
        /// Target room.
        room_id: RoomId,
    },

    /// Stop following a room.
    UnsubscribeRoom {
        /// Target room.
        room_id: RoomId,
    },

    /// Compose a chat message.
    SendChat {
        /// Target room.
        room_id: RoomId,
        /// Message body.
        body: String,
    },

    /// Chat frames could not be written to the transport.
    SendFailed {
        /// Unsent chats, in submission order.
        chats: Vec<PendingChat>,
    },

    /// Follow a user's commit channel, now and after every reconnect.
    WatchCommits {
        /// GitHub login.
        username: String,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open a new transport, replacing any previous one.
    OpenTransport {
        /// Generation every event of this transport must carry.
        generation: u64,
    },

    /// Close the transport.
    CloseTransport {
        /// Generation of the transport to close.
        generation: u64,
    },

    /// Write a control frame.
    Send(ClientFrame),

    /// Write a chat frame. Report failure with [`ClientEvent::SendFailed`].
    SendChat(PendingChat),

    /// Connection state changed.
    ConnectionChanged(ConnectionStatus),

    /// A reconnection attempt is scheduled.
    ReconnectScheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt. Tick once it has elapsed.
        delay: Duration,
    },

    /// Reconnection gave up.
    ReconnectExhausted {
        /// Retries made.
        attempts: u32,
    },

    /// Locally composed message to show immediately.
    Optimistic(ChatMessage),

    /// Confirmed message from the server.
    Deliver(ChatMessage),

    /// User notification.
    Notification(NotificationWire),

    /// Broker notice.
    System(String),

    /// Broker error.
    ServerError(String),

    /// Broker acknowledged a room subscription.
    SubscriptionAcknowledged(RoomId),

    /// Newly counted commits for the followed user.
    CommitCount(CommitCountWire),

    /// Chat held until the transport reopens.
    ChatQueued {
        /// Placeholder id of the queued message.
        local_id: MessageId,
    },

    /// Queued chat evicted by the queue bound. Never sent.
    QueueOverflow {
        /// Room of the evicted message.
        room_id: RoomId,
        /// Placeholder id of the evicted message.
        local_id: MessageId,
    },

    /// Socket path unavailable. Send over REST instead.
    FallbackToRest {
        /// Target room.
        room_id: RoomId,
        /// Placeholder id of the message.
        local_id: MessageId,
        /// Message body.
        body: String,
    },
}

impl ClientAction {
    /// New connection state, for state change actions.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        match self {
            Self::ConnectionChanged(status) => Some(status.state),
            _ => None,
        }
    }
}
