//! Transport seam.
//!
//! A [`Connector`] opens one socket and hands back a [`Transport`]: a pair of
//! channels plus an optional task handle. Frame logic stays in the Sans-IO
//! [`crate::Client`]; the transport only moves text.

use std::future::Future;

use tokio::{sync::mpsc, task::AbortHandle};

use crate::error::TransportError;

/// Event observed on an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame received.
    Text(String),
    /// Socket closed or errored. No further events follow.
    Closed {
        /// Close reason, when known.
        reason: Option<String>,
    },
}

/// Handle to an open socket.
///
/// Dropping the handle closes the socket: the writer sees its channel close
/// and the I/O task is aborted.
#[derive(Debug)]
pub struct Transport {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    task: Option<AbortHandle>,
}

impl Transport {
    /// Wrap the channels of an open socket.
    pub fn new(
        outgoing: mpsc::UnboundedSender<String>,
        incoming: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outgoing, incoming: Some(incoming), task: None }
    }

    /// Abort `task` when the transport is dropped.
    #[must_use]
    pub fn with_task(mut self, task: AbortHandle) -> Self {
        self.task = Some(task);
        self
    }

    /// Queue text for writing.
    ///
    /// # Errors
    ///
    /// - `TransportError::Closed` if the socket is gone
    pub fn send(&self, text: String) -> Result<(), TransportError> {
        self.outgoing.send(text).map_err(|_| TransportError::Closed)
    }

    /// Take the event receiver. Returns `None` after the first call.
    pub fn take_incoming(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.incoming.take()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Opens transports to the real-time endpoint.
///
/// # Implementations
///
/// - [`crate::websocket::WebSocketConnector`]: tokio-tungstenite, behind the
///   `websocket` feature
/// - Simulation: in-process broker from the harness crate
pub trait Connector: Send + Sync + 'static {
    /// Open one transport.
    ///
    /// # Errors
    ///
    /// - `TransportError::Connection` if the socket cannot be opened
    fn connect(&self) -> impl Future<Output = Result<Transport, TransportError>> + Send;
}
