//! Local message cache on a temporary directory.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use commitfield_client::store::{LocalStore, SIGNAL_ROOMS_CHANGED};
use commitfield_core::{ChatMessage, DeliveryState, MessageId};

fn confirmed(id: u64, room_id: u64) -> ChatMessage {
    ChatMessage {
        id: MessageId::server(id.to_string()),
        room_id,
        sender_id: 2,
        sender_name: "lee".into(),
        avatar_url: None,
        body: format!("message {id}"),
        sent_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
        delivery: DeliveryState::Confirmed,
    }
}

#[tokio::test]
async fn missing_room_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), 100);

    assert!(store.load(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn save_keeps_most_recent_confirmed() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), 3);

    let mut messages: Vec<_> = (1..=5).map(|id| confirmed(id, 9)).collect();
    let at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
    messages.push(ChatMessage::optimistic(MessageId::local(1), 9, 7, "kim", "pending", at));
    store.save(9, &messages).await.unwrap();

    let loaded = store.load(9).await.unwrap();
    let ids: Vec<_> = loaded.iter().map(|m| m.id.as_str().to_owned()).collect();
    assert_eq!(ids, ["3", "4", "5"]);
}

#[tokio::test]
async fn remove_forgets_room() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), 100);

    store.save(4, &[confirmed(1, 4)]).await.unwrap();
    store.remove(4).await.unwrap();
    store.remove(4).await.unwrap();

    assert!(store.load(4).await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), 100);
    std::fs::create_dir_all(dir.path().join("rooms")).unwrap();
    std::fs::write(dir.path().join("rooms/5.json"), b"not json").unwrap();

    assert!(store.load(5).await.is_err());
}

#[tokio::test]
async fn signal_round_trips_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), 100);

    assert_eq!(store.read_signal(SIGNAL_ROOMS_CHANGED).await.unwrap(), None);

    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    store.touch_signal(SIGNAL_ROOMS_CHANGED, at).await.unwrap();
    assert_eq!(store.read_signal(SIGNAL_ROOMS_CHANGED).await.unwrap(), Some(at));
}
