//! REST request and response bodies.
//!
//! Every backend response is wrapped in [`ApiEnvelope`]. Failures carry an
//! `errorCode` naming the domain error (for example `ROOM_USER_FULL`).

use serde::{Deserialize, Serialize};

use crate::{RoomId, UserId};

/// Response wrapper used by every REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    /// Whether the call succeeded.
    #[serde(default)]
    pub success: bool,
    /// Human-readable status text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Domain error code on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Payload on success.
    #[serde(default = "none", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> ApiEnvelope<T> {
    /// Successful envelope around `data`.
    pub fn ok(data: T) -> Self {
        Self { success: true, message: None, error_code: None, data: Some(data) }
    }

    /// Failed envelope with a domain error code.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            error_code: Some(code.into()),
            data: None,
        }
    }
}

/// Chat room summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
    /// Room id.
    pub id: RoomId,
    /// Room title.
    pub title: String,
    /// Members currently in the room.
    #[serde(default)]
    pub current_user_count: u32,
    /// Maximum members allowed.
    #[serde(rename = "userCountMax", default)]
    pub max_user_count: u32,
    /// Whether joining requires a password.
    #[serde(default)]
    pub is_private: bool,
    /// Room image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Room participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    /// User id.
    pub user_id: UserId,
    /// Display name.
    #[serde(default)]
    pub nickname: String,
    /// Avatar image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Body of the join call for private rooms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    /// Room password. Omitted for public rooms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Body of the REST send-message fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Message body.
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn room_dto_reads_backend_names() {
        let room: RoomDto = serde_json::from_str(
            r#"{"id":3,"title":"study","currentUserCount":2,"userCountMax":10,"isPrivate":true}"#,
        )
        .unwrap();

        assert_eq!(room.max_user_count, 10);
        assert!(room.is_private);
    }

    #[test]
    fn envelope_without_data_decodes() {
        let env: ApiEnvelope<Vec<RoomDto>> =
            serde_json::from_str(r#"{"success":false,"errorCode":"CHAT_NOT_FOUND"}"#).unwrap();

        assert_eq!(env.error_code.as_deref(), Some("CHAT_NOT_FOUND"));
        assert!(env.data.is_none());
    }

    #[test]
    fn join_request_omits_missing_password() {
        let body = serde_json::to_string(&JoinRoomRequest::default()).unwrap();
        assert_eq!(body, "{}");
    }
}
