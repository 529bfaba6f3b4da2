//! In-process chat backend for simulation.
//!
//! `SimServer` plays both halves of the real backend: a broker that accepts
//! transports and relays frames between sessions, and the REST endpoints
//! (through [`SimBackend`]) that own rooms, membership and stored history.
//! Everything runs on the test's tokio runtime, so paused time applies.
//!
//! The server is a cheap cloneable handle; clones share state.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::SecondsFormat;
use commitfield_client::{
    ApiError, Transport, TransportEvent,
    api::{ChatBackend, NewRoom, RoomTab},
};
use commitfield_core::{MessageId, RoomId, UserId, env::Environment};
use commitfield_proto::{
    COMMIT_CHANNEL_PREFIX, ChatWire, ClientFrame, CommitCountWire, NOTIFICATION_CHANNEL,
    NotificationWire, ServerFrame, WireId,
    payloads::{
        chat::{BroadcastChat, OutboundChat, StoredChat},
        rest::{ParticipantDto, RoomDto},
        stats::{PetDto, PetGrow, UserInfoDto},
    },
};
use tokio::sync::mpsc;

use crate::SimEnv;

/// Messages returned per history page.
pub const HISTORY_PAGE_SIZE: usize = 30;

#[derive(Debug, Clone)]
struct SimRoom {
    title: String,
    creator: UserId,
    max_user_count: u32,
    password: Option<String>,
    image: bool,
    members: BTreeMap<UserId, String>,
    messages: Vec<StoredChat>,
}

impl SimRoom {
    fn dto(&self, id: RoomId) -> RoomDto {
        RoomDto {
            id,
            title: self.title.clone(),
            current_user_count: self.members.len() as u32,
            max_user_count: self.max_user_count,
            is_private: self.password.is_some(),
            image_url: self.image.then(|| format!("/images/rooms/{id}.png")),
        }
    }
}

#[derive(Debug)]
struct Session {
    user_id: UserId,
    to_client: mpsc::UnboundedSender<TransportEvent>,
    rooms: Vec<RoomId>,
    notifications: bool,
    commit_users: Vec<String>,
}

impl Session {
    fn deliver(&self, frame: &ServerFrame) {
        match frame.encode() {
            Ok(text) => {
                let _ = self.to_client.send(TransportEvent::Text(text));
            },
            Err(e) => tracing::warn!(error = %e, "sim server could not encode frame"),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    rooms: BTreeMap<RoomId, SimRoom>,
    sessions: BTreeMap<u64, Session>,
    notifications: HashMap<UserId, Vec<NotificationWire>>,
    received: Vec<ClientFrame>,
    peak_sessions: HashMap<UserId, usize>,
    rest_failure: Option<ApiError>,
    profiles: HashMap<UserId, UserInfoDto>,
    commit_counts: HashMap<String, u64>,
    pets: Vec<PetDto>,
    expired: HashSet<UserId>,
    env: SimEnv,
    next_room_id: RoomId,
    next_session_id: u64,
    next_message_id: u64,
}

impl State {
    fn live_sessions(&self, user_id: UserId) -> usize {
        self.sessions.values().filter(|s| s.user_id == user_id).count()
    }

    fn broadcast(&self, room_id: RoomId, frame: &ServerFrame) {
        for session in self.sessions.values().filter(|s| s.rooms.contains(&room_id)) {
            session.deliver(frame);
        }
    }

    /// Store a chat in its room (if the room exists) and relay it to every
    /// subscribed session.
    fn post(
        &mut self,
        room_id: RoomId,
        user_id: UserId,
        from: &str,
        message: &str,
        send_at: &str,
    ) -> StoredChat {
        self.next_message_id += 1;
        let stored = StoredChat {
            chat_msg_id: WireId::Number(self.next_message_id),
            room_id: Some(room_id),
            user_id,
            nickname: Some(from.to_owned()),
            message: message.to_owned(),
            send_at: Some(send_at.to_owned()),
            avatar_url: None,
        };
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.messages.push(stored.clone());
        }

        let relay = ServerFrame::Chat(ChatWire::Broadcast(BroadcastChat {
            id: Some(stored.chat_msg_id.clone()),
            room_id: Some(room_id),
            user_id,
            from: from.to_owned(),
            message: message.to_owned(),
            send_at: Some(send_at.to_owned()),
            avatar_url: None,
        }));
        self.broadcast(room_id, &relay);
        stored
    }
}

/// Removes the session when its reader task ends or is aborted.
struct SessionGuard {
    server: SimServer,
    session_id: u64,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.server.lock().sessions.remove(&self.session_id).is_some() {
            tracing::debug!(session_id = self.session_id, "sim session closed");
        }
    }
}

/// In-process broker and REST backend.
#[derive(Debug, Clone, Default)]
pub struct SimServer {
    state: Arc<Mutex<State>>,
}

impl SimServer {
    /// Empty server.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a transport for `user_id`.
    ///
    /// Must be called inside a tokio runtime: the session's reader runs as a
    /// task that the returned [`Transport`] aborts on drop.
    pub fn accept(&self, user_id: UserId) -> Transport {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let session_id = {
            let mut state = self.lock();
            state.next_session_id += 1;
            let session_id = state.next_session_id;
            state.sessions.insert(session_id, Session {
                user_id,
                to_client: in_tx,
                rooms: Vec::new(),
                notifications: false,
                commit_users: Vec::new(),
            });

            let live = state.live_sessions(user_id);
            let peak = state.peak_sessions.entry(user_id).or_default();
            *peak = (*peak).max(live);
            session_id
        };
        tracing::debug!(session_id, user_id, "sim session opened");

        let guard = SessionGuard { server: self.clone(), session_id };
        let task = tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                guard.server.receive(guard.session_id, &text);
            }
        });

        Transport::new(out_tx, in_rx).with_task(task.abort_handle())
    }

    fn receive(&self, session_id: u64, text: &str) {
        let mut state = self.lock();
        if !state.sessions.contains_key(&session_id) {
            tracing::debug!(session_id, "frame written to a dropped session is lost");
            return;
        }
        let frame = match ClientFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                if let Some(session) = state.sessions.get(&session_id) {
                    session.deliver(&ServerFrame::Error { message: e.to_string() });
                }
                return;
            },
        };
        state.received.push(frame.clone());

        match frame {
            ClientFrame::Subscribe { room_id: Some(room_id), .. } => {
                if let Some(session) = state.sessions.get_mut(&session_id) {
                    if !session.rooms.contains(&room_id) {
                        session.rooms.push(room_id);
                    }
                    session.deliver(&ServerFrame::SubscribeAck { room_id: Some(room_id) });
                }
            },
            ClientFrame::Subscribe { channel, .. } => {
                if let Some(session) = state.sessions.get_mut(&session_id) {
                    let commit_user =
                        channel.as_deref().and_then(|c| c.strip_prefix(COMMIT_CHANNEL_PREFIX));
                    if channel.as_deref() == Some(NOTIFICATION_CHANNEL) {
                        session.notifications = true;
                    } else if let Some(username) = commit_user {
                        session.commit_users.push(username.to_owned());
                    } else {
                        session.deliver(&ServerFrame::Error {
                            message: format!("unknown channel {channel:?}"),
                        });
                    }
                }
            },
            ClientFrame::Unsubscribe { room_id } => {
                if let Some(session) = state.sessions.get_mut(&session_id) {
                    session.rooms.retain(|r| *r != room_id);
                    session.deliver(&ServerFrame::UnsubscribeAck { room_id: Some(room_id) });
                }
            },
            ClientFrame::Chat(chat) => {
                let OutboundChat { room_id, user_id, from, message, send_at } = chat;
                let _ = state.post(room_id, user_id, &from, &message, &send_at);
            },
        }
    }

    /// Create a room owned by `creator`, who becomes its first member.
    pub fn create_room(
        &self,
        creator: UserId,
        nickname: &str,
        title: &str,
        max_user_count: u32,
        password: Option<&str>,
    ) -> RoomId {
        let mut state = self.lock();
        state.next_room_id += 1;
        let room_id = state.next_room_id;
        state.rooms.insert(room_id, SimRoom {
            title: title.to_owned(),
            creator,
            max_user_count,
            password: password.map(str::to_owned),
            image: false,
            members: BTreeMap::from([(creator, nickname.to_owned())]),
            messages: Vec::new(),
        });
        room_id
    }

    /// Add `user_id` to a room without the REST join checks.
    pub fn add_member(&self, room_id: RoomId, user_id: UserId, nickname: &str) {
        if let Some(room) = self.lock().rooms.get_mut(&room_id) {
            room.members.insert(user_id, nickname.to_owned());
        }
    }

    /// Chat from another user, stored and relayed as if sent on a socket.
    pub fn post_chat(&self, room_id: RoomId, user_id: UserId, from: &str, message: &str) {
        let mut state = self.lock();
        let send_at = state.env.wall_clock().to_rfc3339_opts(SecondsFormat::Millis, true);
        let _ = state.post(room_id, user_id, from, message, &send_at);
    }

    /// Push a notification to `user_id`, storing it for the REST listing.
    pub fn notify(&self, user_id: UserId, message: &str) {
        let mut state = self.lock();
        let notification = NotificationWire {
            id: Some(WireId::Number(state.next_message_id + 1)),
            message: message.to_owned(),
            created_at: None,
            read: false,
        };
        state.next_message_id += 1;

        let frame = ServerFrame::Notification(notification.clone());
        for session in state.sessions.values().filter(|s| s.user_id == user_id && s.notifications) {
            session.deliver(&frame);
        }
        state.notifications.entry(user_id).or_default().push(notification);
    }

    /// Profile served to `user_id`.
    pub fn set_profile(&self, user_id: UserId, info: UserInfoDto) {
        self.lock().profiles.insert(user_id, info);
    }

    /// Pet shown in the pet listing.
    pub fn add_pet(&self, grow: PetGrow, kind: u32) {
        self.lock().pets.push(PetDto { grow, kind });
    }

    /// Count `count` new commits for `username` and push them on the
    /// commit channel.
    pub fn push_commits(&self, username: &str, count: u64) {
        let mut state = self.lock();
        *state.commit_counts.entry(username.to_owned()).or_default() += count;
        for info in state.profiles.values_mut().filter(|p| p.username == username) {
            info.season_commit_count += count;
            info.pet_exp = (info.pet_exp + count).min(info.pet_grow.max_exp());
        }

        let frame =
            ServerFrame::CommitCount(CommitCountWire { username: username.to_owned(), count });
        let watching = |s: &&Session| s.commit_users.iter().any(|u| u == username);
        for session in state.sessions.values().filter(watching) {
            session.deliver(&frame);
        }
    }

    /// Make every REST call of `user_id` answer 401.
    pub fn expire_session(&self, user_id: UserId) {
        self.lock().expired.insert(user_id);
    }

    /// Whether `user_id` has no valid session.
    pub fn is_expired(&self, user_id: UserId) -> bool {
        self.lock().expired.contains(&user_id)
    }

    /// Broker notice to every session.
    pub fn announce(&self, message: &str) {
        let frame = ServerFrame::System { message: message.to_owned() };
        for session in self.lock().sessions.values() {
            session.deliver(&frame);
        }
    }

    /// Close every session from the server side. Frames the clients wrote
    /// but the server has not read yet are lost.
    pub fn drop_connections(&self, reason: &str) {
        let sessions = std::mem::take(&mut self.lock().sessions);
        tracing::debug!(count = sessions.len(), reason, "sim server dropping sessions");

        for session in sessions.into_values() {
            let closed = TransportEvent::Closed { reason: Some(reason.to_owned()) };
            let _ = session.to_client.send(closed);
        }
    }

    /// Make every REST call fail with `error` until cleared with `None`.
    pub fn fail_rest(&self, error: Option<ApiError>) {
        self.lock().rest_failure = error;
    }

    /// Open sessions.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Open sessions of one user.
    pub fn sessions_for(&self, user_id: UserId) -> usize {
        self.lock().live_sessions(user_id)
    }

    /// Most sessions `user_id` ever held at once.
    pub fn peak_sessions(&self, user_id: UserId) -> usize {
        self.lock().peak_sessions.get(&user_id).copied().unwrap_or_default()
    }

    /// Sessions subscribed to a room.
    pub fn subscribers(&self, room_id: RoomId) -> usize {
        self.lock().sessions.values().filter(|s| s.rooms.contains(&room_id)).count()
    }

    /// Every frame received from clients, in order.
    pub fn received(&self) -> Vec<ClientFrame> {
        self.lock().received.clone()
    }

    /// Stored history of a room, oldest first.
    pub fn messages(&self, room_id: RoomId) -> Vec<StoredChat> {
        self.lock().rooms.get(&room_id).map(|r| r.messages.clone()).unwrap_or_default()
    }

    /// Whether the room exists.
    pub fn has_room(&self, room_id: RoomId) -> bool {
        self.lock().rooms.contains_key(&room_id)
    }

    /// Whether `user_id` is a member of the room.
    pub fn is_member(&self, room_id: RoomId, user_id: UserId) -> bool {
        self.lock().rooms.get(&room_id).is_some_and(|r| r.members.contains_key(&user_id))
    }

    /// REST backend acting as `user_id`.
    pub fn backend(&self, user_id: UserId, nickname: &str) -> SimBackend {
        SimBackend { server: self.clone(), user_id, nickname: nickname.to_owned() }
    }
}

fn domain(code: &str) -> ApiError {
    ApiError::Domain { code: code.to_owned(), message: code.to_lowercase() }
}

/// REST view of a [`SimServer`] for one user.
#[derive(Debug, Clone)]
pub struct SimBackend {
    server: SimServer,
    user_id: UserId,
    nickname: String,
}

impl SimBackend {
    fn state(&self) -> Result<MutexGuard<'_, State>, ApiError> {
        let state = self.server.lock();
        if state.expired.contains(&self.user_id) {
            return Err(ApiError::Unauthorized);
        }
        match &state.rest_failure {
            Some(error) => Err(error.clone()),
            None => Ok(state),
        }
    }
}

#[async_trait]
impl ChatBackend for SimBackend {
    async fn rooms(&self, tab: RoomTab, page: u32, size: u32) -> Result<Vec<RoomDto>, ApiError> {
        let state = self.state()?;
        let rooms = state
            .rooms
            .iter()
            .rev()
            .filter(|(_, room)| match tab {
                RoomTab::All => true,
                RoomTab::Created => room.creator == self.user_id,
                RoomTab::Joined => room.members.contains_key(&self.user_id),
            })
            .skip((page * size) as usize)
            .take(size as usize)
            .map(|(id, room)| room.dto(*id))
            .collect();
        Ok(rooms)
    }

    async fn create_room(&self, room: NewRoom) -> Result<Option<RoomDto>, ApiError> {
        drop(self.state()?);
        let room_id = self.server.create_room(
            self.user_id,
            &self.nickname,
            &room.title,
            room.user_count_max,
            room.password.as_deref(),
        );

        let mut state = self.server.lock();
        Ok(state.rooms.get_mut(&room_id).map(|r| {
            r.image = room.image.is_some();
            r.dto(room_id)
        }))
    }

    async fn join_room(&self, room_id: RoomId, password: Option<String>) -> Result<(), ApiError> {
        let mut state = self.state()?;
        let Some(room) = state.rooms.get_mut(&room_id) else {
            return Err(domain("CHAT_NOT_FOUND"));
        };

        if room.members.contains_key(&self.user_id) {
            return Err(domain("ALREADY_JOIN_ROOM"));
        }
        if room.members.len() as u32 >= room.max_user_count {
            return Err(domain("ROOM_USER_FULL"));
        }
        match (&room.password, password) {
            (Some(_), None) => return Err(domain("NEED_TO_PASSWORD")),
            (Some(expected), Some(given)) if *expected != given => {
                return Err(domain("ROOM_PASSWORD_MISMATCH"));
            },
            _ => {},
        }

        room.members.insert(self.user_id, self.nickname.clone());
        Ok(())
    }

    async fn leave_room(&self, room_id: RoomId) -> Result<(), ApiError> {
        let mut state = self.state()?;
        match state.rooms.get_mut(&room_id) {
            Some(room) => {
                if room.members.remove(&self.user_id).is_some() {
                    Ok(())
                } else {
                    Err(domain("NOT_ROOM_MEMBER"))
                }
            },
            None => Err(domain("CHAT_NOT_FOUND")),
        }
    }

    async fn delete_room(&self, room_id: RoomId) -> Result<(), ApiError> {
        let mut state = self.state()?;
        match state.rooms.get(&room_id) {
            Some(room) if room.creator == self.user_id => {
                state.rooms.remove(&room_id);
                Ok(())
            },
            Some(_) => Err(domain("NOT_ROOM_CREATOR")),
            None => Err(domain("CHAT_NOT_FOUND")),
        }
    }

    async fn messages(
        &self,
        room_id: RoomId,
        before: Option<MessageId>,
    ) -> Result<Vec<ChatWire>, ApiError> {
        let state = self.state()?;
        let Some(room) = state.rooms.get(&room_id) else {
            return Ok(Vec::new());
        };

        let cursor = before.and_then(|id| id.as_str().parse::<u64>().ok());
        let older: Vec<_> = room
            .messages
            .iter()
            .filter(|m| match (cursor, &m.chat_msg_id) {
                (Some(cursor), WireId::Number(id)) => *id < cursor,
                _ => true,
            })
            .collect();

        let start = older.len().saturating_sub(HISTORY_PAGE_SIZE);
        Ok(older[start..].iter().map(|m| ChatWire::Stored((*m).clone())).collect())
    }

    async fn send_message(
        &self,
        room_id: RoomId,
        message: String,
    ) -> Result<Option<ChatWire>, ApiError> {
        let mut state = self.state()?;
        if !state.rooms.contains_key(&room_id) {
            return Err(domain("CHAT_NOT_FOUND"));
        }

        let send_at = state.env.wall_clock().to_rfc3339_opts(SecondsFormat::Millis, true);
        let sent = state.post(room_id, self.user_id, &self.nickname, &message, &send_at);
        Ok(Some(ChatWire::Stored(sent)))
    }

    async fn participants(&self, room_id: RoomId) -> Result<Vec<ParticipantDto>, ApiError> {
        let state = self.state()?;
        let room = state.rooms.get(&room_id).ok_or_else(|| domain("CHAT_NOT_FOUND"))?;
        Ok(room
            .members
            .iter()
            .map(|(user_id, nickname)| ParticipantDto {
                user_id: *user_id,
                nickname: nickname.clone(),
                avatar_url: None,
            })
            .collect())
    }

    async fn notifications(&self) -> Result<Vec<NotificationWire>, ApiError> {
        let state = self.state()?;
        Ok(state.notifications.get(&self.user_id).cloned().unwrap_or_default())
    }

    async fn user_info(&self) -> Result<UserInfoDto, ApiError> {
        let state = self.state()?;
        Ok(state.profiles.get(&self.user_id).cloned().unwrap_or_else(|| UserInfoDto {
            username: self.nickname.clone(),
            avatar_url: None,
            season_commit_count: 0,
            pet_exp: 0,
            pet_grow: PetGrow::Egg,
            tier: "SEED".to_owned(),
            last_committed: None,
        }))
    }

    async fn commit_count(&self, username: &str) -> Result<u64, ApiError> {
        let state = self.state()?;
        Ok(state.commit_counts.get(username).copied().unwrap_or_default())
    }

    async fn pets(&self) -> Result<Vec<PetDto>, ApiError> {
        Ok(self.state()?.pets.clone())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.state()?.expired.insert(self.user_id);
        Ok(())
    }
}
