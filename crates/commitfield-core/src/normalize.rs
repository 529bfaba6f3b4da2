//! Inbound frame normalization.
//!
//! The single place where wire payload variants become [`ChatMessage`]s.
//! Control frames are classified separately and never produce a message.
//!
//! Field mapping per variant:
//!
//! ```text
//! id         <- id | chatMsgId | recv-<millis>-<seq>
//! sender     <- from | nickname | "알 수 없는 사용자"
//! body       <- message | content
//! sent_at    <- sendAt (RFC 3339, or naive local time read as UTC) | now
//! room_id    <- roomId | context room
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use commitfield_proto::{ChatWire, CommitCountWire, NotificationWire, ServerFrame, WireId};

use crate::{
    RoomId,
    error::NormalizeError,
    message::{ChatMessage, DeliveryState, MessageId},
};

/// Display name used when a payload names no sender.
pub const UNKNOWN_SENDER: &str = "알 수 없는 사용자";

/// Non-message frame surfaced to diagnostics and listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    /// Broker notice.
    System(String),
    /// Broker error.
    Error(String),
    /// Subscription acknowledged.
    SubscribeAck(Option<RoomId>),
    /// Unsubscription acknowledged.
    UnsubscribeAck(Option<RoomId>),
    /// User notification.
    Notification(NotificationWire),
    /// New commits on a commit channel.
    CommitCount(CommitCountWire),
}

/// Normalized inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Chat message.
    Message(ChatMessage),
    /// Anything else.
    Control(ControlFrame),
}

/// Maps wire frames onto the canonical model.
///
/// Holds a counter used to synthesize ids for payloads that carry none, so
/// two such payloads received in the same millisecond stay distinct.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    seq: u64,
}

impl Normalizer {
    /// New normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and normalize socket text.
    ///
    /// `room_hint` supplies the room for payloads that omit it.
    ///
    /// # Errors
    ///
    /// - `NormalizeError::Protocol` for unparseable or unknown frames
    /// - `NormalizeError::MissingRoom` / `InvalidRoom` for chat payloads
    ///   without a usable room
    pub fn decode(
        &mut self,
        text: &str,
        room_hint: Option<RoomId>,
        now: DateTime<Utc>,
    ) -> Result<Inbound, NormalizeError> {
        let frame = ServerFrame::decode(text)?;
        self.normalize_frame(frame, room_hint, now)
    }

    /// Normalize a decoded frame.
    pub fn normalize_frame(
        &mut self,
        frame: ServerFrame,
        room_hint: Option<RoomId>,
        now: DateTime<Utc>,
    ) -> Result<Inbound, NormalizeError> {
        let control = match frame {
            ServerFrame::Chat(wire) => {
                return self.normalize_chat(wire, room_hint, now).map(Inbound::Message);
            },
            ServerFrame::System { message } => ControlFrame::System(message),
            ServerFrame::Error { message } => ControlFrame::Error(message),
            ServerFrame::SubscribeAck { room_id } => ControlFrame::SubscribeAck(room_id),
            ServerFrame::UnsubscribeAck { room_id } => ControlFrame::UnsubscribeAck(room_id),
            ServerFrame::Notification(n) => ControlFrame::Notification(n),
            ServerFrame::CommitCount(c) => ControlFrame::CommitCount(c),
        };
        Ok(Inbound::Control(control))
    }

    /// Normalize one chat payload.
    ///
    /// History responses omit the room, so the caller passes the room the
    /// page was fetched for as `room_hint`.
    pub fn normalize_chat(
        &mut self,
        wire: ChatWire,
        room_hint: Option<RoomId>,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, NormalizeError> {
        let room_id = wire.room_id().or(room_hint).ok_or(NormalizeError::MissingRoom)?;
        if room_id == 0 {
            return Err(NormalizeError::InvalidRoom(room_id));
        }

        let (id, sender_id, name, avatar_url, body, send_at) = match wire {
            ChatWire::Stored(c) => {
                (Some(c.chat_msg_id), c.user_id, c.nickname, c.avatar_url, c.message, c.send_at)
            },
            ChatWire::Broadcast(c) => {
                (c.id, c.user_id, Some(c.from), c.avatar_url, c.message, c.send_at)
            },
            ChatWire::Content(c) => (c.id, c.user_id, c.nickname, None, c.content, c.send_at),
            ChatWire::Anonymous(c) => (c.id, c.user_id, c.nickname, None, c.message, c.send_at),
        };

        let id = match id {
            Some(id) => server_id(&id),
            None => self.synthesize_id(now),
        };

        Ok(ChatMessage {
            id,
            room_id,
            sender_id,
            sender_name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SENDER.to_owned()),
            avatar_url,
            body,
            sent_at: send_at.as_deref().and_then(parse_timestamp).unwrap_or(now),
            delivery: DeliveryState::Confirmed,
        })
    }

    fn synthesize_id(&mut self, now: DateTime<Utc>) -> MessageId {
        self.seq += 1;
        MessageId::server(format!("recv-{}-{}", now.timestamp_millis(), self.seq))
    }
}

fn server_id(id: &WireId) -> MessageId {
    MessageId::server(id.to_string())
}

/// Parse a wire timestamp.
///
/// The backend emits RFC 3339 in newer builds and zone-less
/// `YYYY-MM-DDTHH:MM:SS[.fff]` in older ones; the latter is read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn decode(normalizer: &mut Normalizer, text: &str, hint: Option<RoomId>) -> Inbound {
        normalizer.decode(text, hint, now()).unwrap()
    }

    #[test]
    fn broadcast_shape() {
        let mut n = Normalizer::new();
        let inbound = decode(
            &mut n,
            concat!(
                r#"{"type":"CHAT","id":9,"roomId":42,"userId":3,"from":"kim","#,
                r#""message":"hello","sendAt":"2024-05-01T10:00:00"}"#,
            ),
            None,
        );

        let Inbound::Message(msg) = inbound else { panic!("expected message") };
        assert_eq!(msg.id, MessageId::server("9"));
        assert_eq!(msg.room_id, 42);
        assert_eq!(msg.sender_name, "kim");
        assert_eq!(msg.body, "hello");
        assert_eq!(msg.sent_at, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(msg.delivery, DeliveryState::Confirmed);
    }

    #[test]
    fn stored_shape_uses_chat_msg_id_and_hint() {
        let mut n = Normalizer::new();
        let inbound = decode(
            &mut n,
            r#"{"type":"CHAT","chatMsgId":"m-5","userId":3,"nickname":"lee","message":"hi"}"#,
            Some(7),
        );

        let Inbound::Message(msg) = inbound else { panic!("expected message") };
        assert_eq!(msg.id.as_str(), "m-5");
        assert_eq!(msg.room_id, 7);
        assert_eq!(msg.sender_name, "lee");
        assert_eq!(msg.sent_at, now());
    }

    #[test]
    fn content_shape_without_name() {
        let mut n = Normalizer::new();
        let inbound =
            decode(&mut n, r#"{"type":"CHAT","roomId":2,"userId":3,"content":"body"}"#, None);

        let Inbound::Message(msg) = inbound else { panic!("expected message") };
        assert_eq!(msg.body, "body");
        assert_eq!(msg.sender_name, UNKNOWN_SENDER);
        assert!(msg.id.as_str().starts_with("recv-"));
        assert!(!msg.id.is_placeholder());
    }

    #[test]
    fn synthesized_ids_are_distinct() {
        let mut n = Normalizer::new();
        let text = r#"{"type":"CHAT","roomId":2,"userId":3,"message":"x"}"#;
        let (Inbound::Message(a), Inbound::Message(b)) =
            (decode(&mut n, text, None), decode(&mut n, text, None))
        else {
            panic!("expected messages")
        };
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn control_frames_are_not_messages() {
        let mut n = Normalizer::new();
        for text in [
            r#"{"type":"SYSTEM","message":"welcome"}"#,
            r#"{"type":"ERROR","message":"nope"}"#,
            r#"{"type":"SUBSCRIBE_ACK","roomId":4}"#,
            r#"{"type":"UNSUBSCRIBE_ACK"}"#,
            r#"{"type":"NOTIFICATION","message":"new member"}"#,
            r#"{"type":"COMMIT_COUNT","username":"whale22","count":2}"#,
        ] {
            assert!(matches!(decode(&mut n, text, Some(4)), Inbound::Control(_)), "{text}");
        }
    }

    #[test]
    fn chat_without_room_is_rejected() {
        let mut n = Normalizer::new();
        let text = r#"{"type":"CHAT","id":1,"userId":3,"from":"kim","message":"x"}"#;
        assert_eq!(n.decode(text, None, now()), Err(NormalizeError::MissingRoom));

        let zero = r#"{"type":"CHAT","id":1,"roomId":0,"userId":3,"from":"kim","message":"x"}"#;
        assert_eq!(n.decode(zero, None, now()), Err(NormalizeError::InvalidRoom(0)));
    }

    #[test]
    fn malformed_text_is_an_error() {
        let mut n = Normalizer::new();
        assert!(matches!(n.decode("{not json", None, now()), Err(NormalizeError::Protocol(_))));
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:00:00+09:00"), Some(expected));
        let naive = parse_timestamp("2024-05-01T01:00:00.123");
        assert_eq!(naive.map(|t| t.timestamp()), Some(expected.timestamp()));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
