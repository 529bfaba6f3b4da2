//! Client state machine.
//!
//! The `Client` aggregates the connection, the subscription registry, the
//! outbound queue and the normalizer behind one event handler. On every
//! transport open it subscribes the notification and commit channels, replays
//! the registry, then flushes queued chats in submission order, all before any
//! later event is handled.
//!
//! A chat counts as delivered once the broker echoes it. Chats still unechoed
//! when their transport closes go back to the head of the queue.

use chrono::SecondsFormat;
use commitfield_core::{
    ChatMessage, Connection, ConnectionState,
    connection::{ConnectionAction, ConnectionStatus},
    env::Environment,
    message::{LocalIds, validate_body},
    normalize::{ControlFrame, Inbound, Normalizer},
    outbound::{OutboundQueue, PendingChat},
    registry::{SubscribeOutcome, SubscriptionRegistry, validate_room_id},
};
use commitfield_proto::{ClientFrame, NOTIFICATION_CHANNEL, OutboundChat, RoomId, commit_channel};

use crate::{
    config::{ClientConfig, Identity},
    error::ClientError,
    event::{ClientAction, ClientEvent},
};

/// Chat client state machine.
pub struct Client<E: Environment> {
    /// Environment for time.
    env: E,

    /// Who we send as.
    identity: Identity,

    /// Transport lifecycle.
    connection: Connection<E::Instant>,

    /// Rooms we intend to follow.
    registry: SubscriptionRegistry,

    /// Chats composed while the transport is down.
    queue: OutboundQueue,

    /// Inbound frame mapping.
    normalizer: Normalizer,

    /// Placeholder id generator.
    local_ids: LocalIds,

    /// Subscribe to the notification channel on open.
    notifications: bool,

    /// User whose commit channel is followed.
    commit_user: Option<String>,
}

impl<E: Environment> Client<E> {
    /// Create a disconnected client.
    pub fn new(env: E, identity: Identity, config: &ClientConfig) -> Self {
        Self {
            env,
            identity,
            connection: Connection::new(config.reconnect_policy()),
            registry: SubscriptionRegistry::new(),
            queue: OutboundQueue::new(config.outbound_capacity),
            normalizer: Normalizer::new(),
            local_ids: LocalIds::new(),
            notifications: config.notifications,
            commit_user: None,
        }
    }

    /// Identity messages are sent as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connection snapshot for observers.
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Generation of the newest transport.
    pub fn generation(&self) -> u64 {
        self.connection.generation()
    }

    /// Subscription registry.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Chats waiting for the transport.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Chats written but not yet echoed.
    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    /// User whose commit channel is followed.
    pub fn commit_user(&self) -> Option<&str> {
        self.commit_user.as_deref()
    }

    /// Process an event and return resulting actions.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Connect => {
                let actions = self.connection.connect();
                Ok(self.map_connection(actions))
            },
            ClientEvent::Disconnect => Ok(self.handle_disconnect()),
            ClientEvent::TransportOpened { generation } => Ok(self.handle_opened(generation)),
            ClientEvent::TransportClosed { generation } => Ok(self.handle_closed(generation)),
            ClientEvent::TextReceived { generation, text } => {
                Ok(self.handle_text(generation, &text))
            },
            ClientEvent::Tick { now } => {
                let actions = self.connection.tick(now);
                Ok(self.map_connection(actions))
            },
            ClientEvent::SubscribeRoom { room_id } => self.handle_subscribe(room_id),
            ClientEvent::UnsubscribeRoom { room_id } => self.handle_unsubscribe(room_id),
            ClientEvent::SendChat { room_id, body } => self.handle_send_chat(room_id, &body),
            ClientEvent::SendFailed { chats } => Ok(self.handle_send_failed(chats)),
            ClientEvent::WatchCommits { username } => Ok(self.handle_watch_commits(username)),
        }
    }

    fn handle_disconnect(&mut self) -> Vec<ClientAction> {
        let connected = self.connection.state() == ConnectionState::Connected;
        let mut actions = Vec::new();

        for room_id in self.registry.clear() {
            if connected {
                actions.push(ClientAction::Send(ClientFrame::unsubscribe_room(room_id)));
            }
        }

        let pending = self.queue.clear();
        let conn_actions = self.connection.disconnect();
        actions.extend(self.map_connection(conn_actions));
        actions.extend(pending.into_iter().map(Self::fallback));

        tracing::info!("disconnected by request");
        actions
    }

    fn handle_opened(&mut self, generation: u64) -> Vec<ClientAction> {
        let conn_actions = match self.connection.handle_open(generation) {
            Ok(actions) => actions,
            Err(e) => {
                tracing::debug!(generation, error = %e, "ignoring transport open");
                return Vec::new();
            },
        };

        let mut actions = self.map_connection(conn_actions);

        if self.notifications {
            actions.push(ClientAction::Send(ClientFrame::subscribe_channel(NOTIFICATION_CHANNEL)));
        }
        if let Some(username) = &self.commit_user {
            let channel = commit_channel(username);
            actions.push(ClientAction::Send(ClientFrame::subscribe_channel(channel)));
        }

        let replay = self.registry.replay();
        let replayed = replay.len();
        actions.extend(replay.into_iter().map(ClientAction::Send));

        // Left over when no close was seen for the previous transport
        let evicted = self.queue.requeue_in_flight();
        actions.extend(evicted.into_iter().map(Self::overflow));

        let flush = self.queue.drain();
        let flushed = flush.len();
        for chat in flush {
            actions.push(self.write(chat));
        }

        tracing::info!(generation, replayed, flushed, "connected");
        actions
    }

    fn handle_closed(&mut self, generation: u64) -> Vec<ClientAction> {
        let current = generation == self.connection.generation()
            && self.connection.state() != ConnectionState::Disconnected;

        let mut actions = Vec::new();
        if current {
            let unechoed = self.queue.in_flight();
            if unechoed > 0 {
                tracing::info!(generation, unechoed, "transport closed before chats were echoed");
            }
            let evicted = self.queue.requeue_in_flight();
            actions.extend(evicted.into_iter().map(Self::overflow));
        }

        match self.connection.handle_closed(generation, self.env.now()) {
            Ok(conn_actions) => actions.extend(self.map_connection(conn_actions)),
            Err(e) => tracing::debug!(generation, error = %e, "ignoring transport close"),
        }
        actions
    }

    fn handle_text(&mut self, generation: u64, text: &str) -> Vec<ClientAction> {
        if generation != self.connection.generation() {
            tracing::debug!(generation, "dropping frame from replaced transport");
            return Vec::new();
        }

        match self.normalizer.decode(text, None, self.env.wall_clock()) {
            Ok(Inbound::Message(msg)) => {
                if msg.sender_id == self.identity.user_id
                    && let Some(chat) = self.queue.confirm(msg.room_id, &msg.body)
                {
                    tracing::trace!(local_id = %chat.local_id, "chat echoed");
                }
                vec![ClientAction::Deliver(msg)]
            },
            Ok(Inbound::Control(control)) => self.handle_control(control),
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                Vec::new()
            },
        }
    }

    fn handle_control(&mut self, control: ControlFrame) -> Vec<ClientAction> {
        match control {
            ControlFrame::System(message) => {
                tracing::debug!(%message, "system frame");
                vec![ClientAction::System(message)]
            },
            ControlFrame::Error(message) => {
                tracing::warn!(%message, "server error frame");
                vec![ClientAction::ServerError(message)]
            },
            ControlFrame::SubscribeAck(Some(room_id)) => {
                if self.registry.acknowledge(room_id) {
                    tracing::debug!(room_id, "subscription acknowledged");
                    vec![ClientAction::SubscriptionAcknowledged(room_id)]
                } else {
                    tracing::debug!(room_id, "ack for untracked room");
                    Vec::new()
                }
            },
            ControlFrame::SubscribeAck(None) => {
                tracing::debug!("subscription acknowledged");
                Vec::new()
            },
            ControlFrame::UnsubscribeAck(room_id) => {
                tracing::debug!(?room_id, "unsubscription acknowledged");
                Vec::new()
            },
            ControlFrame::Notification(notification) => {
                vec![ClientAction::Notification(notification)]
            },
            ControlFrame::CommitCount(update) => {
                if self.commit_user.as_deref() == Some(update.username.as_str())
                    || update.username.is_empty()
                {
                    vec![ClientAction::CommitCount(update)]
                } else {
                    tracing::debug!(username = %update.username, "commit count for another user");
                    Vec::new()
                }
            },
        }
    }

    fn handle_subscribe(&mut self, room_id: RoomId) -> Result<Vec<ClientAction>, ClientError> {
        let connected = self.connection.state() == ConnectionState::Connected;

        match self.registry.subscribe(room_id, connected)? {
            SubscribeOutcome::Sent(frame) => Ok(vec![ClientAction::Send(frame)]),
            SubscribeOutcome::Pending => {
                tracing::debug!(room_id, "subscription recorded until connected");
                Ok(Vec::new())
            },
            SubscribeOutcome::AlreadyTracked => Ok(Vec::new()),
        }
    }

    fn handle_unsubscribe(&mut self, room_id: RoomId) -> Result<Vec<ClientAction>, ClientError> {
        let connected = self.connection.state() == ConnectionState::Connected;
        let frame = self.registry.unsubscribe(room_id, connected)?;
        Ok(frame.into_iter().map(ClientAction::Send).collect())
    }

    fn handle_send_chat(
        &mut self,
        room_id: RoomId,
        body: &str,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let room_id = validate_room_id(room_id)?;
        let body = validate_body(body)?;

        let now = self.env.wall_clock();
        let local_id = self.local_ids.next(now);
        let optimistic = ChatMessage::optimistic(
            local_id.clone(),
            room_id,
            self.identity.user_id,
            self.identity.nickname.clone(),
            body.clone(),
            now,
        );

        let chat = PendingChat {
            local_id,
            frame: OutboundChat {
                room_id,
                user_id: self.identity.user_id,
                from: self.identity.nickname.clone(),
                message: body,
                send_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        };

        let mut actions = vec![ClientAction::Optimistic(optimistic)];
        actions.extend(self.dispatch_chat(chat));
        Ok(actions)
    }

    /// Route a chat: write now, queue behind earlier chats, or fall back.
    fn dispatch_chat(&mut self, chat: PendingChat) -> Vec<ClientAction> {
        if self.connection.state() == ConnectionState::Connected && self.queue.is_empty() {
            return vec![self.write(chat)];
        }

        if !self.connection.expects_transport() {
            tracing::debug!(local_id = %chat.local_id, "no transport expected, sending over rest");
            return vec![Self::fallback(chat)];
        }

        let local_id = chat.local_id.clone();
        tracing::debug!(%local_id, queued = self.queue.len() + 1, "chat queued");

        let evicted = self.queue.push(chat);
        let mut actions = vec![ClientAction::ChatQueued { local_id }];
        actions.extend(evicted.map(Self::overflow));
        actions
    }

    /// Hand a chat to the transport and track it until echoed.
    fn write(&mut self, chat: PendingChat) -> ClientAction {
        self.queue.written(chat.clone());
        ClientAction::SendChat(chat)
    }

    fn handle_send_failed(&mut self, chats: Vec<PendingChat>) -> Vec<ClientAction> {
        self.queue.not_written(&chats);

        if self.connection.expects_transport() {
            tracing::debug!(count = chats.len(), "requeueing unsent chats");
            let evicted = self.queue.requeue_front(chats);
            evicted.into_iter().map(Self::overflow).collect()
        } else {
            chats.into_iter().map(Self::fallback).collect()
        }
    }

    fn handle_watch_commits(&mut self, username: String) -> Vec<ClientAction> {
        if self.commit_user.as_deref() == Some(username.as_str()) {
            return Vec::new();
        }

        tracing::info!(%username, "following commit channel");
        let frame = ClientFrame::subscribe_channel(commit_channel(&username));
        self.commit_user = Some(username);

        if self.connection.state() == ConnectionState::Connected {
            vec![ClientAction::Send(frame)]
        } else {
            Vec::new()
        }
    }

    fn map_connection(&mut self, actions: Vec<ConnectionAction>) -> Vec<ClientAction> {
        let mut out = Vec::with_capacity(actions.len());

        for action in actions {
            match action {
                ConnectionAction::OpenTransport { generation } => {
                    out.push(ClientAction::OpenTransport { generation });
                },
                ConnectionAction::CloseTransport { generation } => {
                    out.push(ClientAction::CloseTransport { generation });
                },
                ConnectionAction::StateChanged(_) => {
                    out.push(ClientAction::ConnectionChanged(self.connection.status()));
                },
                ConnectionAction::ReconnectScheduled { attempt, delay } => {
                    tracing::info!(attempt, ?delay, "reconnect scheduled");
                    out.push(ClientAction::ReconnectScheduled { attempt, delay });
                },
                ConnectionAction::ReconnectExhausted { attempts } => {
                    tracing::warn!(attempts, "reconnect attempts exhausted");
                    out.push(ClientAction::ReconnectExhausted { attempts });
                    out.extend(self.queue.clear().into_iter().map(Self::fallback));
                },
            }
        }

        out
    }

    fn fallback(chat: PendingChat) -> ClientAction {
        ClientAction::FallbackToRest {
            room_id: chat.frame.room_id,
            local_id: chat.local_id,
            body: chat.frame.message,
        }
    }

    fn overflow(chat: PendingChat) -> ClientAction {
        ClientAction::QueueOverflow { room_id: chat.frame.room_id, local_id: chat.local_id }
    }
}
