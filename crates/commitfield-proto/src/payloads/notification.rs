//! User notification payloads.

use serde::{Deserialize, Serialize};

use crate::payloads::chat::WireId;

/// Notification pushed on the `notifications` channel or listed over REST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationWire {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    /// Notification text.
    #[serde(default)]
    pub message: String,
    /// ISO-8601 creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Whether the user has read it.
    #[serde(default)]
    pub read: bool,
}
