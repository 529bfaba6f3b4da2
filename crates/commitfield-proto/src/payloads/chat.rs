//! Chat message payloads.
//!
//! The backend has shipped several shapes for the same logical message:
//!
//! | Variant       | Id field    | Sender name | Body      |
//! |---------------|-------------|-------------|-----------|
//! | `Stored`      | `chatMsgId` | `nickname`  | `message` |
//! | `Broadcast`   | `id`        | `from`      | `message` |
//! | `Content`     | `id`        | `nickname`  | `content` |
//! | `Anonymous`   | `id`        | `nickname`  | `message` |
//!
//! [`ChatWire`] tries them in that order. Mapping all of them onto one message
//! model happens in exactly one place, the normalizer in `commitfield-core`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{RoomId, UserId};

/// Message id as sent by the server: numeric in newer builds, text in older.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    /// Numeric id.
    Number(u64),
    /// Textual id.
    Text(String),
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Every chat payload shape the backend is known to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatWire {
    /// Persisted message as returned by the history endpoint.
    Stored(StoredChat),
    /// Live message relayed by the broker.
    Broadcast(BroadcastChat),
    /// Older live shape using `content` for the body.
    Content(ContentChat),
    /// Live message without a sender name field.
    Anonymous(AnonymousChat),
}

impl ChatWire {
    /// Room the payload names, if it carries one.
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::Stored(c) => c.room_id,
            Self::Broadcast(c) => c.room_id,
            Self::Content(c) => c.room_id,
            Self::Anonymous(c) => c.room_id,
        }
    }
}

/// History entry shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredChat {
    /// Server-assigned id.
    pub chat_msg_id: WireId,
    /// Room, when present. History responses usually omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Sender.
    pub user_id: UserId,
    /// Sender display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Message body.
    pub message: String,
    /// ISO-8601 send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<String>,
    /// Sender avatar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Broker relay shape. Mirrors [`OutboundChat`] plus the assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastChat {
    /// Server-assigned id, absent on some broker builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    /// Target room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Sender.
    pub user_id: UserId,
    /// Sender display name.
    pub from: String,
    /// Message body.
    pub message: String,
    /// ISO-8601 send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<String>,
    /// Sender avatar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Older live shape with a `content` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChat {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    /// Target room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Sender.
    pub user_id: UserId,
    /// Sender display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Message body.
    pub content: String,
    /// ISO-8601 send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<String>,
}

/// Live shape with no `from` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousChat {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    /// Target room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Sender.
    pub user_id: UserId,
    /// Sender display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Message body.
    pub message: String,
    /// ISO-8601 send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<String>,
}

/// Chat frame written by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundChat {
    /// Target room.
    pub room_id: RoomId,
    /// Sender.
    pub user_id: UserId,
    /// Sender display name. The broker expects `from`.
    pub from: String,
    /// Message body.
    pub message: String,
    /// ISO-8601 send time.
    pub send_at: String,
}
