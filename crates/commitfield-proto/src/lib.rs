//! Wire protocol
//!
//! JSON envelope spoken over the chat WebSocket and the DTOs returned by the
//! REST API. Every frame carries a `type` discriminator; payload fields use the
//! backend's camelCase naming.
//!
//! # Components
//!
//! - [`ClientFrame`]: frames the client writes (subscribe, unsubscribe, chat)
//! - [`ServerFrame`]: frames the server pushes (chat, control, notification,
//!   commit count)
//! - [`payloads::chat::ChatWire`]: the historical chat payload shapes the
//!   backend has emitted, as one tagged union
//! - [`payloads::rest`]: REST request and response bodies
//! - [`payloads::stats`]: profile, pets and commit counts

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod frame;
pub mod payloads;

pub use errors::ProtocolError;
pub use frame::{
    COMMIT_CHANNEL_PREFIX, ClientFrame, NOTIFICATION_CHANNEL, ServerFrame, commit_channel,
};
pub use payloads::{
    chat::{ChatWire, OutboundChat, WireId},
    notification::NotificationWire,
    stats::CommitCountWire,
};

/// Room identifier assigned by the backend. Valid ids are positive.
pub type RoomId = u64;

/// User identifier assigned by the backend.
pub type UserId = u64;
