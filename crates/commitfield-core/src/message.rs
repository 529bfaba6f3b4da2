//! Canonical chat message model.
//!
//! Every inbound wire shape and every locally composed message ends up as a
//! [`ChatMessage`]. Locally composed messages carry a placeholder id of the
//! form `local-<millis>` until the server echo confirms them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RoomId, UserId, error::BodyError};

/// Character limit for a message body.
pub const MAX_BODY_CHARS: usize = 300;

/// Prefix of locally generated placeholder ids.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Message identifier: server-assigned, or a local placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Server-assigned id.
    pub fn server(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Local placeholder id for a message composed at `millis`.
    pub fn local(millis: i64) -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{millis}"))
    }

    /// Whether this is a local placeholder awaiting confirmation.
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    /// Id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryState {
    /// Shown locally, not yet confirmed by the server.
    Optimistic,
    /// Received from the server.
    Confirmed,
    /// Could not be delivered by either the socket or the REST fallback.
    Failed,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server id or local placeholder.
    pub id: MessageId,
    /// Room the message belongs to.
    pub room_id: RoomId,
    /// Sender.
    pub sender_id: UserId,
    /// Sender display name.
    pub sender_name: String,
    /// Sender avatar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Message body, at most [`MAX_BODY_CHARS`] characters.
    pub body: String,
    /// Send time.
    pub sent_at: DateTime<Utc>,
    /// Delivery state.
    pub delivery: DeliveryState,
}

impl ChatMessage {
    /// Optimistic message composed locally.
    pub fn optimistic(
        id: MessageId,
        room_id: RoomId,
        sender_id: UserId,
        sender_name: impl Into<String>,
        body: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            room_id,
            sender_id,
            sender_name: sender_name.into(),
            avatar_url: None,
            body: body.into(),
            sent_at,
            delivery: DeliveryState::Optimistic,
        }
    }

    /// Whether `other` is the server echo of this optimistic message.
    pub fn is_echoed_by(&self, other: &ChatMessage) -> bool {
        self.delivery == DeliveryState::Optimistic
            && self.id.is_placeholder()
            && self.room_id == other.room_id
            && self.sender_id == other.sender_id
            && self.body == other.body
    }
}

/// Validate a composed body.
///
/// Returns the body trimmed of surrounding whitespace.
///
/// # Errors
///
/// - `BodyError::Empty` if nothing but whitespace remains
/// - `BodyError::TooLong` if the trimmed body exceeds [`MAX_BODY_CHARS`]
pub fn validate_body(body: &str) -> Result<String, BodyError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(BodyError::Empty);
    }

    let len = trimmed.chars().count();
    if len > MAX_BODY_CHARS {
        return Err(BodyError::TooLong { len });
    }

    Ok(trimmed.to_owned())
}

/// Generator for placeholder ids.
///
/// Millisecond timestamps collide when two messages are composed in the same
/// millisecond, so the generator bumps to the next unused millisecond.
#[derive(Debug, Clone, Default)]
pub struct LocalIds {
    last: Option<i64>,
}

impl LocalIds {
    /// New generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next placeholder id for a message composed at `now`.
    pub fn next(&mut self, now: DateTime<Utc>) -> MessageId {
        let mut millis = now.timestamp_millis();
        if let Some(last) = self.last
            && millis <= last
        {
            millis = last + 1;
        }
        self.last = Some(millis);
        MessageId::local(millis)
    }
}
