//! Client error types.

use commitfield_core::error::{BodyError, RegistryError};
use thiserror::Error;

/// Errors from the client state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Room id rejected by the registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Composed body rejected.
    #[error(transparent)]
    Body(#[from] BodyError),
}

/// Errors from the long-lived chat service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service task has stopped.
    #[error("chat service stopped")]
    Stopped,

    /// Reconnection gave up before a transport opened.
    #[error("connection failed after {attempts} attempts")]
    ConnectFailed {
        /// Retries made.
        attempts: u32,
    },

    /// `disconnect` was called while the connect was pending.
    #[error("connection cancelled by disconnect")]
    Cancelled,

    /// Request rejected by the client state machine.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Errors from opening or using a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Transport closed while writing.
    #[error("transport closed")]
    Closed,
}

/// Errors from the configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Base URL does not parse.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// Rejected value.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Base URL scheme is not http or https.
    #[error("unsupported url scheme {0:?}")]
    UnsupportedScheme(String),

    /// No cache directory configured and none known for this platform.
    #[error("no cache directory available")]
    NoCacheDir,

    /// HTTP client could not be built.
    #[error("http client: {0}")]
    HttpClient(String),
}

/// Errors from the local message cache.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache file is not valid JSON.
    #[error("cache file corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Normalized REST failure: a status and a user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401. The session is missing or expired.
    #[error("login required")]
    Unauthorized,

    /// 400 without a domain error code.
    #[error("bad request: {message}")]
    BadRequest {
        /// Server-provided message.
        message: String,
    },

    /// Domain error code reported by the backend.
    #[error("{code}: {message}")]
    Domain {
        /// Error code, for example `ROOM_USER_FULL`.
        code: String,
        /// Server-provided message.
        message: String,
    },

    /// Any other non-success status.
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status.
        status: u16,
        /// Server-provided message.
        message: String,
    },

    /// Request did not complete.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not decode.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Generic text for failures without a specific message.
pub const GENERIC_FAILURE: &str = "요청을 처리하지 못했습니다. 잠시 후 다시 시도해주세요.";

impl ApiError {
    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::BadRequest { .. } => Some(400),
            Self::Server { status, .. } => Some(*status),
            Self::Domain { .. } | Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    /// Domain error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Domain { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Text to show the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized => "로그인이 필요합니다.".to_owned(),
            Self::BadRequest { message } if !message.is_empty() => message.clone(),
            Self::Domain { code, message } => match domain_message(code) {
                Some(text) => text.to_owned(),
                None if !message.is_empty() => message.clone(),
                None => GENERIC_FAILURE.to_owned(),
            },
            Self::BadRequest { .. }
            | Self::Server { .. }
            | Self::Transport(_)
            | Self::Decode(_) => {
                GENERIC_FAILURE.to_owned()
            },
        }
    }
}

/// User-facing text for known domain error codes.
pub fn domain_message(code: &str) -> Option<&'static str> {
    match code {
        "ROOM_PASSWORD_MISMATCH" => Some("비밀번호가 일치하지 않습니다."),
        "NEED_TO_PASSWORD" => Some("비밀번호가 필요합니다."),
        "ROOM_USER_FULL" => Some("채팅방 인원이 가득 찼습니다."),
        "ALREADY_JOIN_ROOM" => Some("이미 참여한 채팅방입니다."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_codes_map_to_user_text() {
        let err = ApiError::Domain {
            code: "ROOM_PASSWORD_MISMATCH".into(),
            message: "password mismatch".into(),
        };
        assert_eq!(err.user_message(), "비밀번호가 일치하지 않습니다.");
        assert_eq!(err.code(), Some("ROOM_PASSWORD_MISMATCH"));
    }

    #[test]
    fn unknown_code_uses_server_text() {
        let err = ApiError::Domain { code: "WHATEVER".into(), message: "nope".into() };
        assert_eq!(err.user_message(), "nope");
    }

    #[test]
    fn status_of_each_class() {
        assert_eq!(ApiError::Unauthorized.status(), Some(401));
        assert_eq!(ApiError::BadRequest { message: "x".into() }.status(), Some(400));
        assert_eq!(ApiError::Server { status: 503, message: String::new() }.status(), Some(503));
        assert_eq!(ApiError::Transport("refused".into()).status(), None);
    }

    #[test]
    fn bad_request_shows_server_message() {
        let err = ApiError::BadRequest { message: "제목이 너무 깁니다".into() };
        assert_eq!(err.user_message(), "제목이 너무 깁니다");
        let err = ApiError::Server { status: 500, message: "boom".into() };
        assert_eq!(err.user_message(), GENERIC_FAILURE);
    }
}
