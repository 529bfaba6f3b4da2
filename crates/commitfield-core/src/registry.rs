//! Room subscription registry.
//!
//! Records which rooms the client intends to follow. The registry is the
//! source of truth for subscriptions: the transport only ever learns about a
//! room through a frame the registry produced, and after every reconnect the
//! registry replays one `SUBSCRIBE` per tracked room.
//!
//! Iteration order is ascending room id, which keeps replay stable.

use std::collections::BTreeMap;

use commitfield_proto::ClientFrame;

use crate::{RoomId, error::RegistryError};

/// One tracked room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomSubscription {
    /// Room id, always positive.
    pub room_id: RoomId,
    /// Broker acknowledged the latest `SUBSCRIBE` for this room.
    pub acknowledged: bool,
}

/// Result of [`SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// Newly tracked. Send this frame now.
    Sent(ClientFrame),
    /// Newly tracked while not connected. Replayed on the next open.
    Pending,
    /// Already tracked. Nothing to do.
    AlreadyTracked,
}

/// Reject room ids that are not positive.
pub fn validate_room_id(room_id: RoomId) -> Result<RoomId, RegistryError> {
    if room_id == 0 {
        return Err(RegistryError::InvalidRoomId(room_id.to_string()));
    }
    Ok(room_id)
}

/// Parse a room id from user or route input.
pub fn parse_room_id(text: &str) -> Result<RoomId, RegistryError> {
    text.trim()
        .parse::<RoomId>()
        .map_err(|_| RegistryError::InvalidRoomId(text.to_owned()))
        .and_then(validate_room_id)
}

/// Tracked room set.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    rooms: BTreeMap<RoomId, RoomSubscription>,
}

impl SubscriptionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `room_id`.
    ///
    /// Idempotent: tracking a room twice sends nothing the second time.
    ///
    /// # Errors
    ///
    /// - `RegistryError::InvalidRoomId` if `room_id` is zero
    pub fn subscribe(
        &mut self,
        room_id: RoomId,
        connected: bool,
    ) -> Result<SubscribeOutcome, RegistryError> {
        let room_id = validate_room_id(room_id)?;

        if self.rooms.contains_key(&room_id) {
            return Ok(SubscribeOutcome::AlreadyTracked);
        }

        self.rooms.insert(room_id, RoomSubscription { room_id, acknowledged: false });

        if connected {
            Ok(SubscribeOutcome::Sent(ClientFrame::subscribe_room(room_id)))
        } else {
            Ok(SubscribeOutcome::Pending)
        }
    }

    /// Stop tracking `room_id`.
    ///
    /// Returns the `UNSUBSCRIBE` frame to send, if any. No frame is produced
    /// while disconnected: the broker forgot the subscription with the socket.
    ///
    /// # Errors
    ///
    /// - `RegistryError::InvalidRoomId` if `room_id` is zero
    pub fn unsubscribe(
        &mut self,
        room_id: RoomId,
        connected: bool,
    ) -> Result<Option<ClientFrame>, RegistryError> {
        let room_id = validate_room_id(room_id)?;

        let was_tracked = self.rooms.remove(&room_id).is_some();
        Ok((was_tracked && connected).then(|| ClientFrame::unsubscribe_room(room_id)))
    }

    /// Record a `SUBSCRIBE_ACK`. Returns false for rooms no longer tracked.
    pub fn acknowledge(&mut self, room_id: RoomId) -> bool {
        match self.rooms.get_mut(&room_id) {
            Some(sub) => {
                sub.acknowledged = true;
                true
            },
            None => false,
        }
    }

    /// One `SUBSCRIBE` per tracked room for a freshly opened transport.
    ///
    /// Clears acknowledgements: they belonged to the previous socket.
    pub fn replay(&mut self) -> Vec<ClientFrame> {
        self.rooms
            .values_mut()
            .map(|sub| {
                sub.acknowledged = false;
                ClientFrame::subscribe_room(sub.room_id)
            })
            .collect()
    }

    /// Forget every room. Returns the rooms that were tracked.
    pub fn clear(&mut self) -> Vec<RoomId> {
        let rooms = self.rooms.keys().copied().collect();
        self.rooms.clear();
        rooms
    }

    /// Whether `room_id` is tracked.
    pub fn is_tracked(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// Tracked rooms in replay order.
    pub fn tracked(&self) -> impl Iterator<Item = &RoomSubscription> {
        self.rooms.values()
    }

    /// Number of tracked rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// No rooms tracked.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_while_connected_sends_frame() {
        let mut registry = SubscriptionRegistry::new();
        assert_eq!(
            registry.subscribe(42, true),
            Ok(SubscribeOutcome::Sent(ClientFrame::subscribe_room(42)))
        );
        assert_eq!(registry.subscribe(42, true), Ok(SubscribeOutcome::AlreadyTracked));
    }

    #[test]
    fn subscribe_while_disconnected_records_intent() {
        let mut registry = SubscriptionRegistry::new();
        assert_eq!(registry.subscribe(7, false), Ok(SubscribeOutcome::Pending));
        assert!(registry.is_tracked(7));
        assert_eq!(registry.replay(), vec![ClientFrame::subscribe_room(7)]);
    }

    #[test]
    fn zero_room_is_rejected() {
        let mut registry = SubscriptionRegistry::new();
        assert!(matches!(registry.subscribe(0, true), Err(RegistryError::InvalidRoomId(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn parse_room_ids() {
        assert_eq!(parse_room_id(" 12 "), Ok(12));
        assert!(parse_room_id("0").is_err());
        assert!(parse_room_id("-3").is_err());
        assert!(parse_room_id("abc").is_err());
    }

    #[test]
    fn unsubscribe_sends_only_when_connected_and_tracked() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(1, true).unwrap();
        registry.subscribe(2, true).unwrap();

        assert_eq!(registry.unsubscribe(1, true), Ok(Some(ClientFrame::unsubscribe_room(1))));
        assert_eq!(registry.unsubscribe(2, false), Ok(None));
        assert_eq!(registry.unsubscribe(3, true), Ok(None));
        assert!(registry.is_empty());
    }

    #[test]
    fn replay_is_stable_and_resets_acks() {
        let mut registry = SubscriptionRegistry::new();
        for room in [30, 10, 20] {
            registry.subscribe(room, false).unwrap();
        }
        assert!(registry.acknowledge(10));
        assert!(!registry.acknowledge(99));

        let frames = registry.replay();
        let rooms: Vec<_> = frames.iter().filter_map(ClientFrame::room_id).collect();
        assert_eq!(rooms, vec![10, 20, 30]);
        assert!(registry.tracked().all(|s| !s.acknowledged));
    }

    #[test]
    fn clear_returns_tracked_rooms() {
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(5, false).unwrap();
        registry.subscribe(4, false).unwrap();
        assert_eq!(registry.clear(), vec![4, 5]);
        assert!(registry.replay().is_empty());
    }
}
