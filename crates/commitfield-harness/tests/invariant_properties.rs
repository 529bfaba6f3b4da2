//! Invariant checks against generated snapshots.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use chrono::{FixedOffset, TimeZone, Utc};
use commitfield_app::{App, AppAction, AppEvent};
use commitfield_core::{ChatMessage, DeliveryState, MessageId};
use commitfield_harness::{
    ClientSnapshot, Invariant, InvariantKind, InvariantRegistry, MessageSnapshot, OpenRoomOnly,
    SystemSnapshot, UniqueServerIds,
};
use proptest::prelude::*;

fn message_strategy() -> impl Strategy<Value = MessageSnapshot> {
    (prop_oneof![Just("local-"), Just("")], 0u8..6, 1u64..3).prop_map(|(prefix, n, room_id)| {
        MessageSnapshot {
            id: format!("{prefix}{n}"),
            room_id,
            body: format!("m{n}"),
            delivery: if prefix.is_empty() {
                DeliveryState::Confirmed
            } else {
                DeliveryState::Optimistic
            },
        }
    })
}

fn client_with(messages: Vec<MessageSnapshot>, open_room: Option<u64>) -> SystemSnapshot {
    let mut client = ClientSnapshot::new(7);
    client.open_room = open_room;
    SystemSnapshot::single(messages.into_iter().fold(client, ClientSnapshot::with_message))
}

proptest! {
    #[test]
    fn prop_unique_ids_flags_exactly_duplicates(
        messages in prop::collection::vec(message_strategy(), 0..12)
    ) {
        let mut seen = HashSet::new();
        let duplicated = messages
            .iter()
            .filter(|m| !m.is_placeholder())
            .any(|m| !seen.insert(m.id.clone()));

        let result = UniqueServerIds.check(&client_with(messages, Some(1)));
        prop_assert_eq!(result.is_err(), duplicated);
    }

    #[test]
    fn prop_open_room_only_flags_foreign_messages(
        messages in prop::collection::vec(message_strategy(), 0..12),
        open_room in prop::option::of(1u64..3),
    ) {
        let foreign = messages.iter().any(|m| Some(m.room_id) != open_room);

        let result = OpenRoomOnly.check(&client_with(messages, open_room));
        prop_assert_eq!(result.is_err(), foreign);
        if let Err(violation) = result {
            prop_assert_eq!(violation.invariant, InvariantKind::OpenRoomOnly);
        }
    }

    #[test]
    fn prop_unsettled_snapshots_tolerate_placeholders(
        messages in prop::collection::vec(message_strategy(), 0..12)
    ) {
        let snapshot = client_with(messages.clone(), Some(1));
        let registry = InvariantRegistry::standard();
        let settled_orphans = messages.iter().any(|m| m.delivery == DeliveryState::Optimistic);

        let busy = registry.check_all(&snapshot).err().unwrap_or_default();
        prop_assert!(busy.iter().all(|v| v.invariant != InvariantKind::NoOrphanPlaceholder));

        let settled = registry.check_all(&snapshot.settled()).err().unwrap_or_default();
        let flagged = settled.iter().any(|v| v.invariant == InvariantKind::NoOrphanPlaceholder);
        prop_assert_eq!(flagged, settled_orphans);
    }
}

#[test]
fn snapshot_of_open_room_with_pending_send() {
    let mut app = App::new(7, FixedOffset::east_opt(9 * 3600).unwrap());
    let actions = app.handle(AppEvent::Joined { room_id: 42 });
    let request = actions
        .iter()
        .find_map(|a| match a {
            AppAction::FetchHistory { request, .. } => Some(*request),
            _ => None,
        })
        .unwrap();

    let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let history = ChatMessage {
        id: MessageId::server("10"),
        room_id: 42,
        sender_id: 2,
        sender_name: "lee".into(),
        avatar_url: None,
        body: "hello".into(),
        sent_at: at,
        delivery: DeliveryState::Confirmed,
    };
    let _ = app.handle(AppEvent::HistoryLoaded { room_id: 42, request, page: vec![history] });
    let sent = ChatMessage::optimistic(MessageId::local(1), 42, 7, "kim", "hi", at);
    let _ = app.handle(AppEvent::Optimistic(sent));

    let snapshot = SystemSnapshot::single(ClientSnapshot::from_app(&app));
    insta::assert_json_snapshot!(snapshot, @r#"
    {
      "clients": [
        {
          "id": 7,
          "live_transports": 0,
          "peak_transports": 0,
          "open_room": 42,
          "messages": [
            {
              "id": "10",
              "room_id": 42,
              "body": "hello",
              "delivery": "Confirmed"
            },
            {
              "id": "local-1",
              "room_id": 42,
              "body": "hi",
              "delivery": "Optimistic"
            }
          ]
        }
      ],
      "quiescent": false
    }
    "#);

    assert!(InvariantRegistry::standard().check_all(&snapshot).is_ok());
    assert!(InvariantRegistry::standard().check_all(&snapshot.settled()).is_err());
}
