//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::HashSet;

use commitfield_core::DeliveryState;

use super::{Invariant, InvariantKind, InvariantResult, SystemSnapshot, Violation};

/// At most one transport per client, ever.
///
/// `connect` while connecting or connected must reuse the pending or open
/// transport, and a reconnect must close the old transport first.
pub struct OneLiveTransport;

impl Invariant for OneLiveTransport {
    fn kind(&self) -> InvariantKind {
        InvariantKind::OneLiveTransport
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.live_transports > 1 || client.peak_transports > 1 {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "client {}: {} live transports (peak {})",
                        client.id, client.live_transports, client.peak_transports
                    ),
                });
            }
        }
        Ok(())
    }
}

/// No server id appears twice in a message list.
pub struct UniqueServerIds;

impl Invariant for UniqueServerIds {
    fn kind(&self) -> InvariantKind {
        InvariantKind::UniqueServerIds
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            for msg in client.messages.iter().filter(|m| !m.is_placeholder()) {
                if !seen.insert(msg.id.as_str()) {
                    return Err(Violation {
                        invariant: self.kind(),
                        message: format!("client {}: message {} shown twice", client.id, msg.id),
                    });
                }
            }
        }
        Ok(())
    }
}

/// The open room only shows its own messages.
pub struct OpenRoomOnly;

impl Invariant for OpenRoomOnly {
    fn kind(&self) -> InvariantKind {
        InvariantKind::OpenRoomOnly
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let foreign = client.messages.iter().find(|m| Some(m.room_id) != client.open_room);
            if let Some(msg) = foreign {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "client {}: room {:?} shows message {} of room {}",
                        client.id, client.open_room, msg.id, msg.room_id
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Once the system settles, no message is left optimistic.
///
/// Every placeholder is confirmed by its echo or marked failed. Only checked
/// on quiescent snapshots.
pub struct NoOrphanPlaceholder;

impl Invariant for NoOrphanPlaceholder {
    fn kind(&self) -> InvariantKind {
        InvariantKind::NoOrphanPlaceholder
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        if !state.quiescent {
            return Ok(());
        }

        for client in &state.clients {
            let orphan = client.messages.iter().find(|m| m.delivery == DeliveryState::Optimistic);
            if let Some(msg) = orphan {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!(
                        "client {}: {} ({:?}) never settled",
                        client.id, msg.id, msg.body
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariants::{ClientSnapshot, MessageSnapshot};

    fn msg(id: &str, room_id: u64, delivery: DeliveryState) -> MessageSnapshot {
        MessageSnapshot { id: id.into(), room_id, body: "x".into(), delivery }
    }

    #[test]
    fn second_transport_is_a_violation() {
        let snapshot = SystemSnapshot::single(ClientSnapshot::new(1).with_transports(1, 2));
        assert!(OneLiveTransport.check(&snapshot).is_err());
    }

    #[test]
    fn duplicate_server_id_is_a_violation() {
        let client = ClientSnapshot { open_room: Some(1), ..ClientSnapshot::new(1) }
                .with_message(msg("9", 1, DeliveryState::Confirmed))
            .with_message(msg("9", 1, DeliveryState::Confirmed));

        assert!(UniqueServerIds.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn foreign_message_is_a_violation() {
        let client = ClientSnapshot { open_room: Some(1), ..ClientSnapshot::new(1) }
            .with_message(msg("9", 2, DeliveryState::Confirmed));

        assert!(OpenRoomOnly.check(&SystemSnapshot::single(client)).is_err());
    }

    #[test]
    fn optimistic_message_only_fails_when_settled() {
        let client = ClientSnapshot { open_room: Some(1), ..ClientSnapshot::new(1) }
            .with_message(msg("local-5", 1, DeliveryState::Optimistic));
        let snapshot = SystemSnapshot::single(client);

        assert!(NoOrphanPlaceholder.check(&snapshot).is_ok());
        assert!(NoOrphanPlaceholder.check(&snapshot.settled()).is_err());
    }
}
