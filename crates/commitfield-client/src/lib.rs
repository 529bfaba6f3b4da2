//! Client
//!
//! Chat client for the CommitField backend: the action-based state machine,
//! the long-lived service that owns the single real-time transport, and the
//! REST backend used for history, room management and send fallback.
//!
//! # Architecture
//!
//! [`Client`] follows the Sans-IO pattern of [`commitfield_core`]. It receives
//! [`ClientEvent`]s and returns [`ClientAction`]s. [`ChatService`] is the only
//! place that executes them: it runs on a tokio task, opens sockets through a
//! [`Connector`] and notifies registered listeners.
//!
//! # Components
//!
//! - [`Client`]: connection, subscriptions, outbound queue and normalizer
//! - [`ChatService`]: one shared transport per process
//! - [`api::ChatBackend`]: REST operations, implemented by [`api::ChatApi`]
//! - [`cache::RoomListCache`]: short-lived room list cache
//! - [`store::LocalStore`]: per-room message cache on disk
//!
//! # Transport (optional)
//!
//! With the `websocket` feature enabled, [`websocket::WebSocketConnector`]
//! opens real sockets with `tokio-tungstenite`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
pub mod cache;
mod client;
pub mod config;
pub mod error;
mod event;
pub mod service;
pub mod store;
pub mod system_env;
pub mod transport;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use client::Client;
pub use commitfield_core::{RoomId, UserId, env::Environment};
pub use config::{ClientConfig, Identity};
pub use error::{ApiError, ClientError, ServiceError};
pub use event::{ClientAction, ClientEvent};
pub use service::{ChatService, ListenerHandle, ServiceEvent};
pub use system_env::SystemEnv;
pub use transport::{Connector, Transport, TransportEvent};
