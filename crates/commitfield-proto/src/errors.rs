//! Protocol errors.

use thiserror::Error;

/// Errors raised while encoding or decoding wire frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload could not be parsed as a known frame.
    #[error("frame decode failed: {0}")]
    Decode(String),

    /// Frame could not be serialized.
    #[error("frame encode failed: {0}")]
    Encode(String),
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
