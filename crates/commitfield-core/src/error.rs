//! Error types for the client core.
//!
//! Strongly-typed errors per layer: connection lifecycle errors, subscription
//! registry validation, message composition and inbound normalization.

use thiserror::Error;

use crate::{RoomId, connection::ConnectionState, message::MAX_BODY_CHARS};

/// Errors from the connection state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Event does not apply in the current state.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the event arrived.
        state: ConnectionState,
        /// Event that was applied.
        operation: &'static str,
    },

    /// Event came from a transport that has since been replaced.
    #[error("stale transport event: generation {received}, current {current}")]
    StaleTransport {
        /// Generation of the live transport.
        current: u64,
        /// Generation named by the event.
        received: u64,
    },
}

impl ConnectionError {
    /// Returns true if the event can be dropped without affecting state.
    ///
    /// Stale events are expected after a manual reconnect or disconnect: the
    /// old socket's close callback still fires.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleTransport { .. })
    }
}

/// Errors from the subscription registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Room ids must be positive integers.
    #[error("invalid room id: {0:?}")]
    InvalidRoomId(String),
}

/// Errors from composing a chat message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    /// Body is empty or whitespace only.
    #[error("message body is empty")]
    Empty,

    /// Body exceeds the character limit.
    #[error("message body has {len} characters, limit is {MAX_BODY_CHARS}")]
    TooLong {
        /// Character count of the rejected body.
        len: usize,
    },
}

/// Errors from normalizing an inbound frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Frame text was not a known frame.
    #[error(transparent)]
    Protocol(#[from] commitfield_proto::ProtocolError),

    /// Chat payload named no room and none was implied by context.
    #[error("chat payload without room id")]
    MissingRoom,

    /// Chat payload named a room id of zero.
    #[error("chat payload for invalid room {0}")]
    InvalidRoom(RoomId),
}
