//! Frame envelopes.
//!
//! Both directions use a JSON object with a `type` discriminator. The
//! discriminator values are fixed by the backend:
//!
//! ```text
//! client -> server   SUBSCRIBE | UNSUBSCRIBE | CHAT
//! server -> client   CHAT | SYSTEM | ERROR | SUBSCRIBE_ACK | UNSUBSCRIBE_ACK | NOTIFICATION
//!                    | COMMIT_COUNT
//! ```
//!
//! Only `CHAT` frames carry user messages. Everything else is a control frame
//! and must never end up in a room's message list.

use serde::{Deserialize, Serialize};

use crate::{
    RoomId,
    errors::{ProtocolError, Result},
    payloads::{
        chat::ChatWire, chat::OutboundChat, notification::NotificationWire,
        stats::CommitCountWire,
    },
};

/// Channel name used to subscribe to user notifications.
pub const NOTIFICATION_CHANNEL: &str = "notifications";

/// Prefix of per-user commit channels.
pub const COMMIT_CHANNEL_PREFIX: &str = "commit/";

/// Commit channel of `username`.
pub fn commit_channel(username: &str) -> String {
    format!("{COMMIT_CHANNEL_PREFIX}{username}")
}

/// Frames written by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    /// Start receiving a room's live messages, or a named channel.
    Subscribe {
        /// Target room. `None` for channel subscriptions.
        #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
        /// Target channel. `None` for room subscriptions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },

    /// Stop receiving a room's live messages.
    Unsubscribe {
        /// Room to leave.
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },

    /// Chat message for a room.
    Chat(OutboundChat),
}

impl ClientFrame {
    /// Subscribe frame for a room.
    pub fn subscribe_room(room_id: RoomId) -> Self {
        Self::Subscribe { room_id: Some(room_id), channel: None }
    }

    /// Subscribe frame for a named channel.
    pub fn subscribe_channel(channel: impl Into<String>) -> Self {
        Self::Subscribe { room_id: None, channel: Some(channel.into()) }
    }

    /// Unsubscribe frame for a room.
    pub fn unsubscribe_room(room_id: RoomId) -> Self {
        Self::Unsubscribe { room_id }
    }

    /// Room this frame targets. `None` for channel subscriptions.
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Self::Subscribe { room_id, .. } => *room_id,
            Self::Unsubscribe { room_id } => Some(*room_id),
            Self::Chat(chat) => Some(chat.room_id),
        }
    }

    /// Serialize to the JSON text sent on the socket.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse a client frame. Used by test servers.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}

/// Frames pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    /// Chat message in one of its historical shapes.
    Chat(ChatWire),

    /// Informational notice from the broker.
    System {
        /// Notice text.
        #[serde(default)]
        message: String,
    },

    /// Error reported by the broker.
    Error {
        /// Error text.
        #[serde(default)]
        message: String,
    },

    /// Broker acknowledged a room subscription.
    SubscribeAck {
        /// Acknowledged room, when the broker reports it.
        #[serde(rename = "roomId", default)]
        room_id: Option<RoomId>,
    },

    /// Broker acknowledged a room unsubscription.
    UnsubscribeAck {
        /// Acknowledged room, when the broker reports it.
        #[serde(rename = "roomId", default)]
        room_id: Option<RoomId>,
    },

    /// Push notification for the current user.
    Notification(NotificationWire),

    /// New commits counted for a user.
    CommitCount(CommitCountWire),
}

impl ServerFrame {
    /// Parse a frame received on the socket.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Decode` if the text is not JSON or has an unknown or
    ///   missing `type`, or a payload that matches no known shape.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Serialize to JSON text. Used by test servers.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Wire name of this frame's type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat(_) => "CHAT",
            Self::System { .. } => "SYSTEM",
            Self::Error { .. } => "ERROR",
            Self::SubscribeAck { .. } => "SUBSCRIBE_ACK",
            Self::UnsubscribeAck { .. } => "UNSUBSCRIBE_ACK",
            Self::Notification(_) => "NOTIFICATION",
            Self::CommitCount(_) => "COMMIT_COUNT",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::payloads::chat::{BroadcastChat, WireId};

    #[test]
    fn subscribe_room_omits_channel() {
        let text = ClientFrame::subscribe_room(42).encode().unwrap();
        assert_eq!(text, r#"{"type":"SUBSCRIBE","roomId":42}"#);
    }

    #[test]
    fn subscribe_channel_omits_room() {
        let text = ClientFrame::subscribe_channel(NOTIFICATION_CHANNEL).encode().unwrap();
        assert_eq!(text, r#"{"type":"SUBSCRIBE","channel":"notifications"}"#);
    }

    #[test]
    fn decode_control_frames() {
        let ack = ServerFrame::decode(r#"{"type":"SUBSCRIBE_ACK","roomId":7}"#).unwrap();
        assert_eq!(ack, ServerFrame::SubscribeAck { room_id: Some(7) });

        let system = ServerFrame::decode(r#"{"type":"SYSTEM","message":"hi"}"#).unwrap();
        assert_eq!(system, ServerFrame::System { message: "hi".into() });

        let error = ServerFrame::decode(r#"{"type":"ERROR"}"#).unwrap();
        assert_eq!(error, ServerFrame::Error { message: String::new() });
    }

    #[test]
    fn decode_broadcast_chat() {
        let text = concat!(
            r#"{"type":"CHAT","id":9,"roomId":42,"userId":3,"from":"kim","#,
            r#""message":"hello","sendAt":"2024-05-01T10:00:00"}"#,
        );
        let frame = ServerFrame::decode(text).unwrap();

        match frame {
            ServerFrame::Chat(ChatWire::Broadcast(chat)) => {
                assert_eq!(chat.id, Some(WireId::Number(9)));
                assert_eq!(chat.room_id, Some(42));
                assert_eq!(chat.from, "kim");
                assert_eq!(chat.message, "hello");
            },
            other => panic!("expected broadcast chat, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(
            ServerFrame::decode(r#"{"type":"PRESENCE","roomId":1}"#),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn missing_type_is_rejected() {
        assert!(ServerFrame::decode(r#"{"message":"hello","userId":1}"#).is_err());
    }

    #[test]
    fn server_chat_encodes_with_tag() {
        let frame = ServerFrame::Chat(ChatWire::Broadcast(BroadcastChat {
            id: Some(WireId::Text("abc".into())),
            room_id: Some(1),
            user_id: 2,
            from: "lee".into(),
            message: "yo".into(),
            send_at: None,
            avatar_url: None,
        }));

        let text = frame.encode().unwrap();
        assert_eq!(ServerFrame::decode(&text).unwrap(), frame);
        assert!(text.contains(r#""type":"CHAT""#));
    }

    #[test]
    fn commit_frames() {
        let text = ClientFrame::subscribe_channel(commit_channel("whale22")).encode().unwrap();
        assert_eq!(text, r#"{"type":"SUBSCRIBE","channel":"commit/whale22"}"#);

        let frame =
            ServerFrame::decode(r#"{"type":"COMMIT_COUNT","username":"whale22","count":3}"#)
                .unwrap();
        assert_eq!(
            frame,
            ServerFrame::CommitCount(CommitCountWire { username: "whale22".into(), count: 3 })
        );
        assert_eq!(frame.kind(), "COMMIT_COUNT");
    }

    #[test]
    fn room_id_of_frames() {
        assert_eq!(ClientFrame::subscribe_room(5).room_id(), Some(5));
        assert_eq!(ClientFrame::unsubscribe_room(6).room_id(), Some(6));
        assert_eq!(ClientFrame::subscribe_channel("x").room_id(), None);
    }
}
