//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the CLI driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`commitfield_app::Runtime`] orchestration code runs in both production
//! and simulation.
//!
//! The runtime consumes the driver, so tests keep a [`SimHandle`] to inject
//! events and read what was rendered.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use commitfield_app::{App, AppEvent, Driver, Panel, Scroll, SessionState};
use commitfield_client::api::RoomTab;
use commitfield_core::{ConnectionState, RoomId, UserId, connection::ConnectionStatus};

use crate::{
    SimServer,
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot, Violation},
};

/// How long `poll_event` waits when no event is queued.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Longest virtual time [`SimHandle::wait_until`] waits.
pub const WAIT_LIMIT: Duration = Duration::from_secs(60);

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// What the driver has shown so far.
#[derive(Debug, Clone, Default)]
pub struct SimView {
    /// Renders performed.
    pub renders: usize,
    /// Open room and its messages at the last render.
    pub client: ClientSnapshot,
    /// Whether the open room was created by the user.
    pub is_creator: bool,
    /// Selected room list tab.
    pub tab: Option<RoomTab>,
    /// Room ids on the listed page.
    pub rooms: Vec<RoomId>,
    /// Open password prompt: room and error text.
    pub prompt: Option<(RoomId, Option<String>)>,
    /// Connection status at the last render.
    pub connection: Option<ConnectionStatus>,
    /// Status line at the last render.
    pub status: Option<String>,
    /// Service notices at the last render.
    pub notices: Vec<String>,
    /// Members shown for the open room.
    pub participants: Vec<UserId>,
    /// Notifications known at the last render.
    pub notifications: usize,
    /// Screen shown at the last render.
    pub panel: Panel,
    /// Session state at the last render.
    pub session: SessionState,
    /// Season commits and pet experience of the loaded profile.
    pub profile: Option<(u64, u64)>,
    /// Pets listed.
    pub pets: usize,
    /// Last commit lookup: user and count.
    pub lookup: Option<(String, u64)>,
    /// Alerts shown, in order.
    pub alerts: Vec<String>,
    /// Confirmation prompts shown, in order.
    pub confirms: Vec<String>,
    /// Scroll instructions, in order.
    pub scrolls: Vec<Scroll>,
    /// Invariant violations seen at any render.
    pub violations: Vec<Violation>,
    /// Whether the runtime stopped the driver.
    pub stopped: bool,
}

impl SimView {
    /// Bodies of the open room's messages, in display order.
    pub fn bodies(&self) -> Vec<&str> {
        self.client.messages.iter().map(|m| m.body.as_str()).collect()
    }

    /// Whether the live connection is open.
    pub fn connected(&self) -> bool {
        self.connection.is_some_and(|c| c.state == ConnectionState::Connected)
    }

    /// Whether the open room is `room_id`.
    pub fn showing(&self, room_id: RoomId) -> bool {
        self.client.open_room == Some(room_id)
    }
}

#[derive(Default)]
struct Shared {
    events: VecDeque<AppEvent>,
    view: SimView,
}

/// Test-side handle onto a [`SimDriver`].
#[derive(Clone)]
pub struct SimHandle {
    shared: Arc<Mutex<Shared>>,
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a user event.
    pub fn inject(&self, event: AppEvent) {
        self.lock().events.push_back(event);
    }

    /// Copy of everything shown so far.
    pub fn view(&self) -> SimView {
        self.lock().view.clone()
    }

    /// Wait in virtual time until `condition` holds for the view.
    ///
    /// Returns `false` if it did not hold within [`WAIT_LIMIT`].
    pub async fn wait_until(&self, condition: impl Fn(&SimView) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        while tokio::time::Instant::now() < deadline {
            if condition(&self.lock().view) {
                return true;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        false
    }

    /// Queue `event` and wait until `condition` holds.
    pub async fn act(&self, event: AppEvent, condition: impl Fn(&SimView) -> bool) -> bool {
        self.inject(event);
        self.wait_until(condition).await
    }
}

/// Simulation driver for deterministic testing.
pub struct SimDriver {
    shared: Arc<Mutex<Shared>>,
    invariants: Option<InvariantRegistry>,
    server: Option<SimServer>,
    auto_confirm: bool,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDriver {
    /// Create a new simulation driver.
    pub fn new() -> Self {
        Self { shared: Arc::default(), invariants: None, server: None, auto_confirm: false }
    }

    /// Enable invariant checking on every render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Read transport counts from `server` when taking snapshots.
    #[must_use]
    pub fn with_server(mut self, server: SimServer) -> Self {
        self.server = Some(server);
        self
    }

    /// Answer every confirmation prompt with `Confirm`.
    #[must_use]
    pub fn auto_confirm(mut self) -> Self {
        self.auto_confirm = true;
        self
    }

    /// Handle for injecting events and reading output.
    pub fn handle(&self) -> SimHandle {
        SimHandle { shared: Arc::clone(&self.shared) }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of `app` plus the server's view of its transports.
    pub fn snapshot_from_app(&self, app: &App) -> ClientSnapshot {
        let client = ClientSnapshot::from_app(app);
        match &self.server {
            Some(server) => {
                let user_id = app.me();
                let (live, peak) = (server.sessions_for(user_id), server.peak_sessions(user_id));
                client.with_transports(live, peak)
            },
            None => client,
        }
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;

    async fn poll_event(&mut self) -> Result<Option<AppEvent>, Self::Error> {
        let next = self.lock().events.pop_front();
        if next.is_none() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok(next)
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        let client = self.snapshot_from_app(app);
        let violations = match &self.invariants {
            Some(registry) => {
                let snapshot = SystemSnapshot::single(client.clone());
                registry.check_all(&snapshot).err().unwrap_or_default()
            },
            None => Vec::new(),
        };
        for violation in &violations {
            tracing::error!(%violation, "invariant violated");
        }

        let mut shared = self.lock();
        let view = &mut shared.view;
        view.renders += 1;
        view.client = client;
        view.is_creator = app.room().is_some_and(|r| r.is_creator());
        view.tab = Some(app.rooms().tab());
        view.rooms = app.rooms().rooms().iter().map(|r| r.id).collect();
        view.prompt = app.rooms().prompt().map(|p| (p.room_id, p.error.clone()));
        view.connection = Some(app.connection());
        view.status = app.status_message().map(str::to_owned);
        view.notices = app.notices().map(str::to_owned).collect();
        view.participants = app.participants().iter().map(|p| p.user_id).collect();
        view.notifications = app.notifications().len();
        view.panel = app.panel();
        view.session = app.session();
        view.profile = app.profile().info().map(|i| (i.season_commit_count, i.pet_exp));
        view.pets = app.profile().pets().len();
        view.lookup = app.profile().lookup().map(|l| (l.username.clone(), l.count));
        view.violations.extend(violations);
        Ok(())
    }

    fn alert(&mut self, message: &str) -> Result<(), Self::Error> {
        self.lock().view.alerts.push(message.to_owned());
        Ok(())
    }

    fn confirm(&mut self, prompt: &str) -> Result<(), Self::Error> {
        let auto_confirm = self.auto_confirm;
        let mut shared = self.lock();
        shared.view.confirms.push(prompt.to_owned());
        if auto_confirm {
            shared.events.push_back(AppEvent::Confirm);
        }
        Ok(())
    }

    fn scroll(&mut self, scroll: Scroll) -> Result<(), Self::Error> {
        self.lock().view.scrolls.push(scroll);
        Ok(())
    }

    fn stop(&mut self) {
        self.lock().view.stopped = true;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::FixedOffset;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn injected_event_is_polled_once() {
        let mut driver = SimDriver::new();
        driver.handle().inject(AppEvent::RefreshRooms);

        assert!(matches!(driver.poll_event().await.unwrap(), Some(AppEvent::RefreshRooms)));
        assert!(driver.poll_event().await.unwrap().is_none());
    }

    #[test]
    fn render_records_view() {
        let mut driver = SimDriver::new().with_invariants(InvariantRegistry::standard());
        let app = App::new(7, FixedOffset::east_opt(0).unwrap());

        driver.render(&app).unwrap();
        driver.confirm("sure?").unwrap();

        let view = driver.handle().view();
        assert_eq!(view.renders, 1);
        assert_eq!(view.tab, Some(RoomTab::All));
        assert_eq!(view.confirms, vec!["sure?".to_owned()]);
        assert!(view.violations.is_empty());
    }
}
