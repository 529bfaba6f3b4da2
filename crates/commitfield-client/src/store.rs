//! Local message cache and cross-process signals.
//!
//! Layout under the cache directory:
//!
//! ```text
//! rooms/<room_id>.json   most recent confirmed messages, oldest first
//! signals/<key>          RFC 3339 timestamp of the last change
//! ```
//!
//! Another process watching a signal file refreshes its room lists when the
//! timestamp moves.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use commitfield_core::{ChatMessage, RoomId};

use crate::error::StoreError;

/// Signal touched after a room is created, joined, left or deleted.
pub const SIGNAL_ROOMS_CHANGED: &str = "rooms-changed";

/// Per-room message cache on disk.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
    limit: usize,
}

impl LocalStore {
    /// Store rooted at `dir`, keeping at most `limit` messages per room.
    pub fn new(dir: impl Into<PathBuf>, limit: usize) -> Self {
        Self { dir: dir.into(), limit }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn room_path(&self, room_id: RoomId) -> PathBuf {
        self.dir.join("rooms").join(format!("{room_id}.json"))
    }

    fn signal_path(&self, key: &str) -> PathBuf {
        self.dir.join("signals").join(key)
    }

    /// Cached messages for a room. Empty when nothing is cached.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` if the file exists but cannot be read
    /// - `StoreError::Corrupt` if it is not a message list
    pub async fn load(&self, room_id: RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        match tokio::fs::read(self.room_path(room_id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a room's cache with the most recent confirmed messages.
    ///
    /// Placeholders are never written: they are resent, not restored.
    pub async fn save(&self, room_id: RoomId, messages: &[ChatMessage]) -> Result<(), StoreError> {
        let confirmed: Vec<&ChatMessage> =
            messages.iter().filter(|m| !m.id.is_placeholder()).collect();
        let keep = &confirmed[confirmed.len().saturating_sub(self.limit)..];

        let path = self.room_path(room_id);
        write_atomic(&path, &serde_json::to_vec(keep)?).await?;
        tracing::trace!(room_id, count = keep.len(), "room cache saved");
        Ok(())
    }

    /// Forget a room's cache.
    pub async fn remove(&self, room_id: RoomId) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.room_path(room_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Record that `key` changed at `at`.
    pub async fn touch_signal(&self, key: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        write_atomic(&self.signal_path(key), at.to_rfc3339().as_bytes()).await?;
        Ok(())
    }

    /// Last change time of `key`, if it was ever touched.
    ///
    /// An unreadable timestamp counts as never touched.
    pub async fn read_signal(&self, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        match tokio::fs::read_to_string(self.signal_path(key)).await {
            Ok(text) => Ok(DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|t| t.with_timezone(&Utc))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
