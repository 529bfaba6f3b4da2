//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: view state machine
//! - [`ChatService`]: the shared real-time connection
//! - [`ChatBackend`]: REST calls, run as background tasks
//! - [`LocalStore`] and [`RoomListCache`]: local caches
//! - [`Driver`]: frontend I/O
//!
//! Each cycle polls the driver once, then applies service events and
//! finished background tasks. Every result re-enters the [`App`] as an
//! [`AppEvent`]. A task failing with 401 re-enters as
//! [`AppEvent::SessionExpired`].

use std::{collections::VecDeque, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use commitfield_client::{
    ApiError, ChatService, ClientConfig, ServiceError,
    api::{ChatBackend, RoomTab},
    cache::RoomListCache,
    store::{LocalStore, SIGNAL_ROOMS_CHANGED},
};
use commitfield_core::{ChatMessage, RoomId, env::Environment, normalize::Normalizer};
use commitfield_proto::ChatWire;
use tokio::{sync::mpsc, task::JoinSet};

use crate::{App, AppAction, AppEvent, Driver, RuntimeError};

/// Page size used to check membership and ownership.
pub const MEMBERSHIP_PAGE_SIZE: u32 = 100;

/// Interval between checks of the cross-process rooms signal.
pub const SIGNAL_POLL_INTERVAL: Duration = Duration::from_secs(2);

enum Step {
    Continue,
    Quit,
    Then(AppEvent),
}

/// Generic runtime that orchestrates App, service, backend and Driver.
///
/// # Type Parameters
///
/// - `D`: frontend driver
/// - `E`: environment for time
/// - `B`: REST backend
pub struct Runtime<D, E, B>
where
    D: Driver,
    E: Environment,
    B: ChatBackend + 'static,
{
    driver: D,
    env: E,
    app: App,
    service: ChatService,
    backend: Arc<B>,
    store: LocalStore,
    room_cache: RoomListCache<E::Instant>,
    page_size: u32,
    tasks: JoinSet<Option<AppEvent>>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events: mpsc::UnboundedReceiver<AppEvent>,
    seen_signal: Option<DateTime<Utc>>,
    last_signal_check: Option<E::Instant>,
}

impl<D, E, B> Runtime<D, E, B>
where
    D: Driver,
    E: Environment,
    B: ChatBackend + 'static,
{
    /// Create a runtime around an already spawned service.
    pub fn new(
        driver: D,
        env: E,
        app: App,
        service: ChatService,
        backend: Arc<B>,
        store: LocalStore,
        config: &ClientConfig,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        Self {
            driver,
            env,
            app,
            service,
            backend,
            store,
            room_cache: RoomListCache::new(config.room_cache_ttl),
            page_size: config.room_page_size,
            tasks: JoinSet::new(),
            events_tx,
            events,
            seen_signal: None,
            last_signal_check: None,
        }
    }

    /// Run until the app quits.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Driver` if the driver fails
    /// - `RuntimeError::Service` if the chat service stops
    pub async fn run(mut self) -> Result<(), RuntimeError<D::Error>> {
        let tx = self.events_tx.clone();
        let listener = self
            .service
            .on_event(move |event| {
                let _ = tx.send(AppEvent::Service(event.clone()));
            })
            .await?;
        self.seen_signal = self.store.read_signal(SIGNAL_ROOMS_CHANGED).await.ok().flatten();

        let actions = self.app.start();
        let mut quit = self.process_actions(actions).await?;
        while !quit {
            quit = self.process_cycle().await?;
        }

        let _ = self.service.unregister(listener);
        let _ = self.service.disconnect();
        self.tasks.abort_all();
        self.driver.stop();
        Ok(())
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the application should quit.
    async fn process_cycle(&mut self) -> Result<bool, RuntimeError<D::Error>> {
        let input = self.driver.poll_event().await.map_err(RuntimeError::Driver)?;
        if let Some(event) = input
            && self.dispatch(event).await?
        {
            return Ok(true);
        }

        while let Ok(event) = self.events.try_recv() {
            if self.dispatch(event).await? {
                return Ok(true);
            }
        }

        while let Some(joined) = self.tasks.try_join_next() {
            match joined {
                Ok(Some(event)) => {
                    let event = if event.is_unauthorized() {
                        tracing::warn!("backend rejected the session");
                        AppEvent::SessionExpired
                    } else {
                        event
                    };
                    self.complete(&event).await;
                    if self.dispatch(event).await? {
                        return Ok(true);
                    }
                },
                Ok(None) => {},
                Err(e) => tracing::warn!(error = %e, "background task failed"),
            }
        }

        self.poll_signal().await
    }

    async fn dispatch(&mut self, event: AppEvent) -> Result<bool, RuntimeError<D::Error>> {
        let actions = self.app.handle(event);
        self.process_actions(actions).await
    }

    /// Execute actions, feeding immediate results back into the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(
        &mut self,
        initial: Vec<AppAction>,
    ) -> Result<bool, RuntimeError<D::Error>> {
        let mut pending: VecDeque<AppAction> = initial.into();

        while let Some(action) = pending.pop_front() {
            match self.execute(action).await? {
                Step::Continue => {},
                Step::Quit => return Ok(true),
                Step::Then(event) => pending.extend(self.app.handle(event)),
            }
        }
        Ok(false)
    }

    async fn execute(&mut self, action: AppAction) -> Result<Step, RuntimeError<D::Error>> {
        match action {
            AppAction::Render => self.driver.render(&self.app).map_err(RuntimeError::Driver)?,
            AppAction::Quit => return Ok(Step::Quit),
            AppAction::Connect => {
                let service = self.service.clone();
                self.tasks.spawn(async move {
                    if let Err(e) = service.connect().await {
                        tracing::warn!(error = %e, "connect failed");
                    }
                    None
                });
            },
            AppAction::LoadRooms { tab, page } => {
                if let Some(rooms) = self.room_cache.get(tab, page, self.env.now()) {
                    let rooms = rooms.to_vec();
                    return Ok(Step::Then(AppEvent::RoomsLoaded { tab, page, rooms }));
                }
                self.spawn_rooms(tab, page);
            },
            AppAction::JoinRoom { room_id, password, check_membership } => {
                self.spawn_join(room_id, password, check_membership);
            },
            AppAction::CreateRoom(room) => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    Some(match backend.create_room(room).await {
                        Ok(room) => AppEvent::RoomCreated { room },
                        Err(error) => AppEvent::CreateFailed { error },
                    })
                });
            },
            AppAction::CheckCreator { room_id } => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    let created = backend.rooms(RoomTab::Created, 0, MEMBERSHIP_PAGE_SIZE).await;
                    let is_creator = match created {
                        Ok(rooms) => rooms.iter().any(|r| r.id == room_id),
                        Err(ApiError::Unauthorized) => return Some(AppEvent::SessionExpired),
                        Err(e) => {
                            tracing::warn!(room_id, error = %e, "creator check failed");
                            false
                        },
                    };
                    Some(AppEvent::CreatorChecked { room_id, is_creator })
                });
            },
            AppAction::Subscribe { room_id } => {
                tolerate(self.service.subscribe_room(room_id).await)?;
            },
            AppAction::Unsubscribe { room_id } => {
                tolerate(self.service.unsubscribe_room(room_id).await)?;
            },
            AppAction::LoadCache { room_id } => {
                let messages = self.store.load(room_id).await.unwrap_or_else(|e| {
                    tracing::warn!(room_id, error = %e, "room cache unreadable");
                    Vec::new()
                });
                return Ok(Step::Then(AppEvent::CacheLoaded { room_id, messages }));
            },
            AppAction::SaveCache { room_id, messages } => {
                if let Err(e) = self.store.save(room_id, &messages).await {
                    tracing::warn!(room_id, error = %e, "room cache not saved");
                }
            },
            AppAction::PurgeCache { room_id } => {
                if let Err(e) = self.store.remove(room_id).await {
                    tracing::warn!(room_id, error = %e, "room cache not removed");
                }
            },
            AppAction::FetchHistory { room_id, request, cursor } => {
                let backend = Arc::clone(&self.backend);
                let env = self.env.clone();
                self.tasks.spawn(async move {
                    Some(match backend.messages(room_id, cursor).await {
                        Ok(wires) => {
                            let page = normalize_page(wires, room_id, env.wall_clock());
                            AppEvent::HistoryLoaded { room_id, request, page }
                        },
                        Err(error) => AppEvent::HistoryFailed { room_id, request, error },
                    })
                });
            },
            AppAction::SendChat { room_id, body } => {
                return match self.service.send_chat(room_id, body).await {
                    Ok(msg) => Ok(Step::Then(AppEvent::Optimistic(msg))),
                    Err(ServiceError::Client(e)) => {
                        Ok(Step::Then(AppEvent::Error { message: e.to_string() }))
                    },
                    Err(e) => Err(e.into()),
                };
            },
            AppAction::SendViaRest { room_id, local_id, body } => {
                let backend = Arc::clone(&self.backend);
                let env = self.env.clone();
                self.tasks.spawn(async move {
                    Some(match backend.send_message(room_id, body).await {
                        Ok(echo) => {
                            let message = echo.and_then(|wire| {
                                normalize_page(vec![wire], room_id, env.wall_clock()).pop()
                            });
                            AppEvent::RestSent { room_id, local_id, message }
                        },
                        Err(ApiError::Unauthorized) => AppEvent::SessionExpired,
                        Err(e) => {
                            tracing::warn!(room_id, %local_id, error = %e, "rest send failed");
                            AppEvent::SendFailed { room_id, local_id }
                        },
                    })
                });
            },
            AppAction::LeaveRoom { room_id } => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    Some(match backend.leave_room(room_id).await {
                        Ok(()) => AppEvent::LeaveDone { room_id },
                        Err(error) => AppEvent::LeaveFailed { room_id, error },
                    })
                });
            },
            AppAction::DeleteRoom { room_id } => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    Some(match backend.delete_room(room_id).await {
                        Ok(()) => AppEvent::DeleteDone { room_id },
                        Err(error) => AppEvent::DeleteFailed { room_id, error },
                    })
                });
            },
            AppAction::LoadParticipants { room_id } => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    Some(match backend.participants(room_id).await {
                        Ok(participants) => AppEvent::ParticipantsLoaded { room_id, participants },
                        Err(ApiError::Unauthorized) => AppEvent::SessionExpired,
                        Err(e) => AppEvent::Error { message: e.user_message() },
                    })
                });
            },
            AppAction::LoadNotifications => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    match backend.notifications().await {
                        Ok(list) => Some(AppEvent::NotificationsLoaded(list)),
                        Err(ApiError::Unauthorized) => Some(AppEvent::SessionExpired),
                        Err(e) => {
                            tracing::warn!(error = %e, "notifications unavailable");
                            None
                        },
                    }
                });
            },
            AppAction::FetchProfile => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    Some(match backend.user_info().await {
                        Ok(info) => AppEvent::ProfileLoaded(info),
                        Err(error) => AppEvent::ProfileFailed { error },
                    })
                });
            },
            AppAction::FetchPets => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    match backend.pets().await {
                        Ok(pets) => Some(AppEvent::PetsLoaded(pets)),
                        Err(ApiError::Unauthorized) => Some(AppEvent::SessionExpired),
                        Err(e) => Some(AppEvent::Error { message: e.user_message() }),
                    }
                });
            },
            AppAction::FetchCommitCount { username } => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    Some(match backend.commit_count(&username).await {
                        Ok(count) => AppEvent::CommitCountLoaded { username, count },
                        Err(ApiError::Unauthorized) => AppEvent::SessionExpired,
                        Err(e) => AppEvent::Error { message: e.user_message() },
                    })
                });
            },
            AppAction::WatchCommits { username } => {
                tolerate(self.service.watch_commits(username))?;
            },
            AppAction::Logout => {
                let backend = Arc::clone(&self.backend);
                self.tasks.spawn(async move {
                    Some(match backend.logout().await {
                        Ok(()) | Err(ApiError::Unauthorized) => AppEvent::LoggedOut,
                        Err(e) => AppEvent::Error { message: e.user_message() },
                    })
                });
            },
            AppAction::LoginRequired => {
                self.room_cache.invalidate_all();
                tolerate(self.service.disconnect())?;
            },
            AppAction::Scroll(scroll) => self.driver.scroll(scroll).map_err(RuntimeError::Driver)?,
            AppAction::Alert(text) => self.driver.alert(&text).map_err(RuntimeError::Driver)?,
            AppAction::Confirm(text) => self.driver.confirm(&text).map_err(RuntimeError::Driver)?,
        }
        Ok(Step::Continue)
    }

    fn spawn_rooms(&mut self, tab: RoomTab, page: u32) {
        let backend = Arc::clone(&self.backend);
        let size = self.page_size;
        self.tasks.spawn(async move {
            Some(match backend.rooms(tab, page, size).await {
                Ok(rooms) => AppEvent::RoomsLoaded { tab, page, rooms },
                Err(error) => AppEvent::RoomsFailed { tab, error },
            })
        });
    }

    fn spawn_join(&mut self, room_id: RoomId, password: Option<String>, check_membership: bool) {
        let backend = Arc::clone(&self.backend);
        self.tasks.spawn(async move {
            if check_membership {
                match backend.rooms(RoomTab::Joined, 0, MEMBERSHIP_PAGE_SIZE).await {
                    Ok(rooms) if rooms.iter().any(|r| r.id == room_id) => {
                        tracing::debug!(room_id, "already a member");
                        return Some(AppEvent::Joined { room_id });
                    },
                    Ok(_) => {},
                    Err(ApiError::Unauthorized) => return Some(AppEvent::SessionExpired),
                    Err(e) => tracing::debug!(room_id, error = %e, "membership check failed"),
                }
            }

            Some(match backend.join_room(room_id, password).await {
                Ok(()) => AppEvent::Joined { room_id },
                Err(error) => AppEvent::JoinFailed { room_id, error },
            })
        });
    }

    /// Bookkeeping for finished background work before the App sees it.
    async fn complete(&mut self, event: &AppEvent) {
        match event {
            AppEvent::RoomsLoaded { tab, page, rooms } => {
                self.room_cache.put(*tab, *page, rooms.clone(), self.env.now());
            },
            AppEvent::Joined { .. }
            | AppEvent::RoomCreated { .. }
            | AppEvent::LeaveDone { .. }
            | AppEvent::DeleteDone { .. } => self.rooms_changed().await,
            _ => {},
        }
    }

    /// Membership changed here: drop cached lists and tell other processes.
    async fn rooms_changed(&mut self) {
        self.room_cache.invalidate_all();

        let at = self.env.wall_clock();
        if let Err(e) = self.store.touch_signal(SIGNAL_ROOMS_CHANGED, at).await {
            tracing::warn!(error = %e, "rooms signal not written");
        }
        self.seen_signal = Some(at);
    }

    /// Membership changed in another process.
    async fn poll_signal(&mut self) -> Result<bool, RuntimeError<D::Error>> {
        let now = self.env.now();
        if self.last_signal_check.is_some_and(|last| now - last < SIGNAL_POLL_INTERVAL) {
            return Ok(false);
        }
        self.last_signal_check = Some(now);

        let signal = match self.store.read_signal(SIGNAL_ROOMS_CHANGED).await {
            Ok(signal) => signal,
            Err(e) => {
                tracing::debug!(error = %e, "rooms signal unreadable");
                return Ok(false);
            },
        };
        if signal <= self.seen_signal {
            return Ok(false);
        }

        tracing::info!("rooms changed in another process");
        self.seen_signal = signal;
        self.room_cache.invalidate_all();
        self.dispatch(AppEvent::RoomsChanged).await
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Get a mutable reference to the App
    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }
}

/// Requests rejected by the client state machine are logged; a stopped
/// service ends the runtime.
fn tolerate(result: Result<(), ServiceError>) -> Result<(), ServiceError> {
    match result {
        Err(ServiceError::Client(e)) => {
            tracing::warn!(error = %e, "request rejected");
            Ok(())
        },
        other => other,
    }
}

fn normalize_page(wires: Vec<ChatWire>, room_id: RoomId, now: DateTime<Utc>) -> Vec<ChatMessage> {
    let mut normalizer = Normalizer::new();
    wires
        .into_iter()
        .filter_map(|wire| match normalizer.normalize_chat(wire, Some(room_id), now) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!(room_id, error = %e, "dropping malformed history entry");
                None
            },
        })
        .collect()
}
