//! Core
//!
//! Pure state machines behind the CommitField chat client. Nothing in this
//! crate performs I/O: methods take time as input and return actions for the
//! driver to execute, which keeps every transition testable without a socket.
//!
//! # Components
//!
//! - [`connection::Connection`]: transport lifecycle with bounded fixed-delay
//!   reconnection
//! - [`registry::SubscriptionRegistry`]: rooms the client intends to follow,
//!   replayed after every reconnect
//! - [`outbound::OutboundQueue`]: chats composed while the transport is down
//! - [`normalize::Normalizer`]: maps every wire shape onto [`ChatMessage`]
//! - [`timeline::MessageList`]: per-room ordered list with id deduplication
//!   and optimistic placeholder replacement
//! - [`listener::Listeners`]: token-based observer registry

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod listener;
pub mod message;
pub mod normalize;
pub mod outbound;
pub mod registry;
pub mod timeline;

pub use commitfield_proto::{RoomId, UserId};
pub use connection::{Connection, ConnectionAction, ConnectionState, ReconnectPolicy};
pub use message::{ChatMessage, DeliveryState, MessageId};
