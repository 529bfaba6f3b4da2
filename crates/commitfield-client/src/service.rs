//! Long-lived chat service.
//!
//! One [`ChatService`] per process owns the single transport. It is a cheap
//! cloneable handle onto an actor task that runs the Sans-IO [`Client`] and
//! executes its actions: opening sockets through a [`Connector`], writing
//! frames, arming reconnect timers and notifying listeners.
//!
//! ```text
//! handle ── Command ──> actor ── ClientEvent ──> Client
//!                         ^                        │
//!   socket ── Internal ───┘ <──── ClientAction ────┘
//! ```
//!
//! All state lives in the actor, so handlers never interleave.

use std::sync::Arc;

use commitfield_core::{
    ChatMessage, ConnectionState, MessageId, RoomId,
    connection::ConnectionStatus,
    env::Environment,
    listener::{ListenerToken, Listeners},
    outbound::PendingChat,
};
use commitfield_proto::{ClientFrame, CommitCountWire, NotificationWire};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    client::Client,
    config::{ClientConfig, Identity},
    error::{ClientError, ServiceError, TransportError},
    event::{ClientAction, ClientEvent},
    transport::{Connector, Transport, TransportEvent},
};

/// Notice emitted when the transport opens.
pub const NOTICE_CONNECTED: &str = "채팅에 연결되었습니다.";

/// Notice emitted when a reconnect is scheduled.
pub const NOTICE_RECONNECTING: &str = "채팅 연결이 끊어졌습니다. 재연결을 시도합니다...";

/// Notice emitted when reconnection gives up.
pub const NOTICE_FAILED: &str = "채팅 연결에 실패했습니다. 다시 연결해주세요.";

/// Event delivered to service listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// Connection state changed.
    Connection(ConnectionStatus),

    /// Confirmed chat message from the socket.
    Message(ChatMessage),

    /// User notification.
    Notification(NotificationWire),

    /// Connection notice or broker `SYSTEM` frame. Never a chat message.
    System(String),

    /// Broker `ERROR` frame.
    ServerError(String),

    /// Newly counted commits on the followed commit channel.
    CommitCount(CommitCountWire),

    /// Chat held until the transport reopens.
    Queued {
        /// Placeholder id.
        local_id: MessageId,
    },

    /// Chat dropped by the queue bound.
    DeliveryFailed {
        /// Room of the message.
        room_id: RoomId,
        /// Placeholder id.
        local_id: MessageId,
    },

    /// Socket path unavailable. The caller must send over REST.
    FallbackToRest {
        /// Target room.
        room_id: RoomId,
        /// Placeholder id.
        local_id: MessageId,
        /// Message body.
        body: String,
    },
}

/// Registration returned by the `on_*` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerHandle {
    /// Connection change listener.
    Connection(ListenerToken),
    /// Event listener.
    Event(ListenerToken),
}

type ConnectionListener = Box<dyn FnMut(&ConnectionStatus) + Send>;
type EventListener = Box<dyn FnMut(&ServiceEvent) + Send>;

enum Command {
    Connect(oneshot::Sender<Result<(), ServiceError>>),
    Disconnect,
    Subscribe {
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    Unsubscribe {
        room_id: RoomId,
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    Send {
        room_id: RoomId,
        body: String,
        reply: oneshot::Sender<Result<ChatMessage, ServiceError>>,
    },
    WatchCommits(String),
    OnConnectionChange {
        listener: ConnectionListener,
        reply: oneshot::Sender<ListenerHandle>,
    },
    OnEvent {
        listener: EventListener,
        reply: oneshot::Sender<ListenerHandle>,
    },
    Unregister(ListenerHandle),
}

enum Internal {
    Opened { generation: u64, transport: Transport },
    OpenFailed { generation: u64, error: TransportError },
    Transport { generation: u64, event: TransportEvent },
    Tick,
}

/// Handle to the chat service.
#[derive(Clone)]
pub struct ChatService {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService").field("status", &*self.status.borrow()).finish()
    }
}

impl ChatService {
    /// Start the service on the current tokio runtime.
    ///
    /// The service stops when every handle is dropped.
    pub fn spawn<E, C>(env: E, connector: C, identity: Identity, config: &ClientConfig) -> Self
    where
        E: Environment,
        C: Connector,
    {
        let client = Client::new(env.clone(), identity, config);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(client.status());

        let actor = Actor {
            env,
            connector: Arc::new(connector),
            client,
            transport: None,
            internal_tx,
            waiters: Vec::new(),
            connection_listeners: Listeners::new(),
            event_listeners: Listeners::new(),
            status: status_tx,
        };
        tokio::spawn(actor.run(command_rx, internal_rx));

        Self { commands, status }
    }

    /// Connect, resolving once the transport is open.
    ///
    /// Idempotent: resolves immediately when connected and joins the pending
    /// attempt when one is in flight.
    ///
    /// # Errors
    ///
    /// - `ServiceError::ConnectFailed` once reconnection gives up
    /// - `ServiceError::Cancelled` if `disconnect` is called first
    pub async fn connect(&self) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Connect(reply))?;
        rx.await.map_err(|_| ServiceError::Stopped)?
    }

    /// Close the transport, forget every room and cancel reconnection.
    ///
    /// Queued chats are handed back as [`ServiceEvent::FallbackToRest`].
    pub fn disconnect(&self) -> Result<(), ServiceError> {
        self.command(Command::Disconnect)
    }

    /// Follow a room. Recorded and replayed when not yet connected.
    pub async fn subscribe_room(&self, room_id: RoomId) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Subscribe { room_id, reply })?;
        rx.await.map_err(|_| ServiceError::Stopped)?
    }

    /// Stop following a room.
    pub async fn unsubscribe_room(&self, room_id: RoomId) -> Result<(), ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Unsubscribe { room_id, reply })?;
        rx.await.map_err(|_| ServiceError::Stopped)?
    }

    /// Send a chat message. Returns the optimistic message to show now.
    ///
    /// Never fails because of the connection: the message is written, queued
    /// or reported through [`ServiceEvent::FallbackToRest`].
    pub async fn send_chat(
        &self,
        room_id: RoomId,
        body: impl Into<String>,
    ) -> Result<ChatMessage, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Send { room_id, body: body.into(), reply })?;
        rx.await.map_err(|_| ServiceError::Stopped)?
    }

    /// Follow a user's commit channel. Counts arrive as
    /// [`ServiceEvent::CommitCount`] and the channel is resubscribed after
    /// every reconnect.
    pub fn watch_commits(&self, username: impl Into<String>) -> Result<(), ServiceError> {
        self.command(Command::WatchCommits(username.into()))
    }

    /// Register a connection listener. It is called once immediately with
    /// the current status, then on every change.
    pub async fn on_connection_change(
        &self,
        listener: impl FnMut(&ConnectionStatus) + Send + 'static,
    ) -> Result<ListenerHandle, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::OnConnectionChange { listener: Box::new(listener), reply })?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Register an event listener.
    pub async fn on_event(
        &self,
        listener: impl FnMut(&ServiceEvent) + Send + 'static,
    ) -> Result<ListenerHandle, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::OnEvent { listener: Box::new(listener), reply })?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }

    /// Remove a listener.
    pub fn unregister(&self, handle: ListenerHandle) -> Result<(), ServiceError> {
        self.command(Command::Unregister(handle))
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Status watcher.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    fn command(&self, command: Command) -> Result<(), ServiceError> {
        self.commands.send(command).map_err(|_| ServiceError::Stopped)
    }
}

struct Actor<E: Environment, C: Connector> {
    env: E,
    connector: Arc<C>,
    client: Client<E>,
    transport: Option<Transport>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    waiters: Vec<oneshot::Sender<Result<(), ServiceError>>>,
    connection_listeners: Listeners<ConnectionStatus>,
    event_listeners: Listeners<ServiceEvent>,
    status: watch::Sender<ConnectionStatus>,
}

impl<E: Environment, C: Connector> Actor<E, C> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(msg) = internal.recv() => self.handle_internal(msg),
            }
        }

        tracing::debug!("chat service stopped");
        self.transport = None;
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => {
                let status = self.client.status();
                if status.state == ConnectionState::Connected {
                    let _ = reply.send(Ok(()));
                    return;
                }

                self.waiters.push(reply);
                if status.state == ConnectionState::Disconnected && !status.reconnect_pending {
                    self.apply(ClientEvent::Connect);
                }
            },
            Command::Disconnect => {
                self.apply(ClientEvent::Disconnect);
                self.resolve_waiters(&Err(ServiceError::Cancelled));
            },
            Command::Subscribe { room_id, reply } => {
                let result = self.try_apply(ClientEvent::SubscribeRoom { room_id });
                let _ = reply.send(result.map_err(ServiceError::from));
            },
            Command::Unsubscribe { room_id, reply } => {
                let result = self.try_apply(ClientEvent::UnsubscribeRoom { room_id });
                let _ = reply.send(result.map_err(ServiceError::from));
            },
            Command::Send { room_id, body, reply } => {
                let actions = match self.client.handle(ClientEvent::SendChat { room_id, body }) {
                    Ok(actions) => actions,
                    Err(e) => {
                        let _ = reply.send(Err(e.into()));
                        return;
                    },
                };

                let optimistic = actions.iter().find_map(|a| match a {
                    ClientAction::Optimistic(msg) => Some(msg.clone()),
                    _ => None,
                });
                if let Some(msg) = optimistic {
                    let _ = reply.send(Ok(msg));
                }
                self.execute(actions);
            },
            Command::WatchCommits(username) => self.apply(ClientEvent::WatchCommits { username }),
            Command::OnConnectionChange { listener, reply } => {
                let token = self.connection_listeners.register(listener);
                self.connection_listeners.notify_one(token, &self.client.status());
                let _ = reply.send(ListenerHandle::Connection(token));
            },
            Command::OnEvent { listener, reply } => {
                let token = self.event_listeners.register(listener);
                let _ = reply.send(ListenerHandle::Event(token));
            },
            Command::Unregister(handle) => {
                match handle {
                    ListenerHandle::Connection(token) => {
                        self.connection_listeners.unregister(token)
                    },
                    ListenerHandle::Event(token) => self.event_listeners.unregister(token),
                };
            },
        }
    }

    fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::Opened { generation, transport } => self.handle_opened(generation, transport),
            Internal::OpenFailed { generation, error } => {
                tracing::warn!(generation, error = %error, "transport open failed");
                self.apply(ClientEvent::TransportClosed { generation });
            },
            Internal::Transport { generation, event: TransportEvent::Text(text) } => {
                self.apply(ClientEvent::TextReceived { generation, text });
            },
            Internal::Transport { generation, event: TransportEvent::Closed { reason } } => {
                tracing::info!(generation, ?reason, "transport closed");
                if generation == self.client.generation() {
                    self.transport = None;
                }
                self.apply(ClientEvent::TransportClosed { generation });
            },
            Internal::Tick => {
                let now = self.env.now();
                self.apply(ClientEvent::Tick { now });
            },
        }
    }

    fn handle_opened(&mut self, generation: u64, mut transport: Transport) {
        if generation != self.client.generation() {
            tracing::debug!(generation, "discarding transport opened after replacement");
            return;
        }

        if let Some(mut incoming) = transport.take_incoming() {
            let tx = self.internal_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = incoming.recv().await {
                    let closed = matches!(event, TransportEvent::Closed { .. });
                    if tx.send(Internal::Transport { generation, event }).is_err() || closed {
                        return;
                    }
                }
                let event = TransportEvent::Closed { reason: None };
                let _ = tx.send(Internal::Transport { generation, event });
            });
        }

        self.transport = Some(transport);
        self.apply(ClientEvent::TransportOpened { generation });
    }

    fn apply(&mut self, event: ClientEvent<E::Instant>) {
        if let Err(e) = self.try_apply(event) {
            tracing::warn!(error = %e, "client rejected event");
        }
    }

    fn try_apply(&mut self, event: ClientEvent<E::Instant>) -> Result<(), ClientError> {
        let actions = self.client.handle(event)?;
        self.execute(actions);
        Ok(())
    }

    fn execute(&mut self, actions: Vec<ClientAction>) {
        // Once a chat write fails, later chats in the batch stay unwritten
        let mut unsent = Vec::new();

        for action in actions {
            match action {
                ClientAction::OpenTransport { generation } => self.open_transport(generation),
                ClientAction::CloseTransport { generation } => {
                    tracing::debug!(generation, "closing transport");
                    self.transport = None;
                },
                ClientAction::Send(frame) => self.write_frame(&frame),
                ClientAction::SendChat(chat) => {
                    if !unsent.is_empty() || !self.write_chat(&chat) {
                        unsent.push(chat);
                    }
                },
                ClientAction::ConnectionChanged(status) => self.publish_status(status),
                ClientAction::ReconnectScheduled { attempt: _, delay } => {
                    self.schedule_tick(delay);
                    self.emit(ServiceEvent::System(NOTICE_RECONNECTING.to_owned()));
                },
                ClientAction::ReconnectExhausted { attempts } => {
                    self.resolve_waiters(&Err(ServiceError::ConnectFailed { attempts }));
                    self.emit(ServiceEvent::System(NOTICE_FAILED.to_owned()));
                },
                // Returned to the caller of `send_chat`
                ClientAction::Optimistic(_) => {},
                ClientAction::Deliver(msg) => self.emit(ServiceEvent::Message(msg)),
                ClientAction::Notification(n) => self.emit(ServiceEvent::Notification(n)),
                ClientAction::System(text) => self.emit(ServiceEvent::System(text)),
                ClientAction::ServerError(text) => self.emit(ServiceEvent::ServerError(text)),
                ClientAction::SubscriptionAcknowledged(_) => {},
                ClientAction::CommitCount(update) => self.emit(ServiceEvent::CommitCount(update)),
                ClientAction::ChatQueued { local_id } => {
                    self.emit(ServiceEvent::Queued { local_id });
                },
                ClientAction::QueueOverflow { room_id, local_id } => {
                    self.emit(ServiceEvent::DeliveryFailed { room_id, local_id });
                },
                ClientAction::FallbackToRest { room_id, local_id, body } => {
                    self.emit(ServiceEvent::FallbackToRest { room_id, local_id, body });
                },
            }
        }

        if !unsent.is_empty() {
            tracing::debug!(count = unsent.len(), "chats not written");
            self.apply(ClientEvent::SendFailed { chats: unsent });
        }
    }

    fn open_transport(&mut self, generation: u64) {
        // One live transport: drop the previous socket first
        self.transport = None;

        let connector = Arc::clone(&self.connector);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let msg = match connector.connect().await {
                Ok(transport) => Internal::Opened { generation, transport },
                Err(error) => Internal::OpenFailed { generation, error },
            };
            let _ = tx.send(msg);
        });
    }

    fn write_frame(&mut self, frame: &ClientFrame) {
        let text = match frame.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode frame");
                return;
            },
        };

        let sent = self.transport.as_ref().is_some_and(|t| t.send(text).is_ok());
        if !sent {
            tracing::debug!(frame = ?frame, "control frame not written");
        }
    }

    fn write_chat(&self, chat: &PendingChat) -> bool {
        let sent = chat
            .to_client_frame()
            .encode()
            .ok()
            .zip(self.transport.as_ref())
            .is_some_and(|(text, transport)| transport.send(text).is_ok());

        if !sent {
            tracing::debug!(local_id = %chat.local_id, "chat not written");
        }
        sent
    }

    fn publish_status(&mut self, status: ConnectionStatus) {
        self.status.send_replace(status);
        self.connection_listeners.notify(&status);
        self.emit(ServiceEvent::Connection(status));

        if status.state == ConnectionState::Connected {
            self.resolve_waiters(&Ok(()));
            self.emit(ServiceEvent::System(NOTICE_CONNECTED.to_owned()));
        }
    }

    fn schedule_tick(&self, delay: std::time::Duration) {
        let env = self.env.clone();
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            env.sleep(delay).await;
            let _ = tx.send(Internal::Tick);
        });
    }

    fn resolve_waiters(&mut self, result: &Result<(), ServiceError>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }

    fn emit(&mut self, event: ServiceEvent) {
        self.event_listeners.notify(&event);
    }
}
