//! Transport lifecycle state machine.
//!
//! Owns the one logical connection to the real-time endpoint. Uses the action
//! pattern: methods take time as input and return actions for the driver to
//! execute, so the state machine never touches a socket.
//!
//! # State Machine
//!
//! ```text
//!                 connect / retry due
//! ┌──────────────┐ ─────────────────> ┌────────────┐  transport open  ┌───────────┐
//! │ Disconnected │                    │ Connecting │ ───────────────> │ Connected │
//! └──────────────┘ <───────────────── └────────────┘                  └───────────┘
//!        ^            close / error                                         │
//!        └──────────────────────────────────────────────────────────────────┘
//!                                   close / error
//! ```
//!
//! Every transport is tagged with a generation. Events from an older
//! generation are rejected, so at most one transport is ever live.
//!
//! # Reconnection
//!
//! After an unexpected close, exactly one retry is scheduled after a fixed
//! delay. Retries repeat up to `max_attempts`; once exhausted the machine
//! stays `Disconnected` until the caller connects again. No exponential
//! backoff and no jitter.

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use crate::error::ConnectionError;

/// Delay before each reconnection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Reconnection attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Connection state observed by every other component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport is open.
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// The transport is open.
    Connected,
}

/// Actions returned by the connection state machine.
///
/// The driver executes these:
/// - `OpenTransport`: open a socket tagged with `generation`
/// - `CloseTransport`: close the socket tagged with `generation`
/// - the rest are notifications for listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a new transport.
    OpenTransport {
        /// Generation the transport's events must carry.
        generation: u64,
    },

    /// Close the live transport.
    CloseTransport {
        /// Generation of the transport to close.
        generation: u64,
    },

    /// State changed.
    StateChanged(ConnectionState),

    /// A retry will fire after `delay`.
    ReconnectScheduled {
        /// 1-based attempt number of the scheduled retry.
        attempt: u32,
        /// Delay before the retry.
        delay: Duration,
    },

    /// Retries are exhausted. Terminal until the caller connects again.
    ReconnectExhausted {
        /// Retries that were made.
        attempts: u32,
    },
}

/// Fixed-delay reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before each retry.
    pub delay: Duration,
    /// Retries before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { delay: DEFAULT_RECONNECT_DELAY, max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS }
    }
}

/// Retry bookkeeping while disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry<I> {
    /// Nothing scheduled.
    Idle,
    /// Retry due once `delay` has elapsed since `since`.
    Scheduled { since: I },
    /// Gave up.
    Exhausted,
}

/// Point-in-time view of the connection for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current state.
    pub state: ConnectionState,
    /// A retry is scheduled.
    pub reconnect_pending: bool,
    /// Retries are exhausted.
    pub exhausted: bool,
}

/// Connection state machine.
///
/// Pure: no I/O, no clock. Generic over `Instant` so tests and simulation can
/// drive virtual time.
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    state: ConnectionState,
    policy: ReconnectPolicy,
    /// Generation of the newest transport. Zero before the first connect.
    generation: u64,
    /// Retries made since the last successful open.
    attempts: u32,
    retry: Retry<I>,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a connection in [`ConnectionState::Disconnected`].
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            generation: 0,
            attempts: 0,
            retry: Retry::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Generation of the newest transport.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Retries made since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A retry is scheduled.
    pub fn is_reconnect_pending(&self) -> bool {
        matches!(self.retry, Retry::Scheduled { .. })
    }

    /// Retries are exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.retry, Retry::Exhausted)
    }

    /// The transport is open or will be reopened without caller action.
    ///
    /// Outbound frames are worth queueing exactly when this holds.
    pub fn expects_transport(&self) -> bool {
        self.state != ConnectionState::Disconnected || self.is_reconnect_pending()
    }

    /// Snapshot for observers.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            reconnect_pending: self.is_reconnect_pending(),
            exhausted: self.is_exhausted(),
        }
    }

    /// Request a connection.
    ///
    /// Idempotent: returns no actions while a transport is open or opening.
    /// From `Disconnected` (including a scheduled or exhausted retry) the
    /// retry counter resets and a fresh transport is opened immediately.
    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Disconnected {
            return Vec::new();
        }

        self.attempts = 0;
        self.open()
    }

    /// Transport with `generation` reported open.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::StaleTransport` if `generation` is not the newest
    /// - `ConnectionError::InvalidState` if not `Connecting`
    pub fn handle_open(
        &mut self,
        generation: u64,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.check_generation(generation)?;

        if self.state != ConnectionState::Connecting {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "handle_open",
            });
        }

        self.state = ConnectionState::Connected;
        self.attempts = 0;
        self.retry = Retry::Idle;

        Ok(vec![ConnectionAction::StateChanged(ConnectionState::Connected)])
    }

    /// Transport with `generation` closed or errored.
    ///
    /// Error and close callbacks usually both fire; the second one finds the
    /// machine already `Disconnected` and returns no actions.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::StaleTransport` if `generation` is not the newest
    pub fn handle_closed(
        &mut self,
        generation: u64,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.check_generation(generation)?;

        if self.state == ConnectionState::Disconnected {
            return Ok(Vec::new());
        }

        self.state = ConnectionState::Disconnected;
        let mut actions = vec![ConnectionAction::StateChanged(ConnectionState::Disconnected)];

        if self.attempts < self.policy.max_attempts {
            self.retry = Retry::Scheduled { since: now };
            actions.push(ConnectionAction::ReconnectScheduled {
                attempt: self.attempts + 1,
                delay: self.policy.delay,
            });
        } else {
            self.retry = Retry::Exhausted;
            actions.push(ConnectionAction::ReconnectExhausted { attempts: self.attempts });
        }

        Ok(actions)
    }

    /// Process periodic maintenance: fire a due retry.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        let Retry::Scheduled { since } = self.retry else {
            return Vec::new();
        };

        if now - since < self.policy.delay {
            return Vec::new();
        }

        self.attempts += 1;
        tracing::info!(
            attempt = self.attempts,
            max_attempts = self.policy.max_attempts,
            "reconnecting"
        );
        self.open()
    }

    /// Close on request of the caller. Cancels any scheduled retry.
    ///
    /// Bumps the generation so the old transport's late close callback is
    /// rejected as stale.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.retry = Retry::Idle;
        self.attempts = 0;

        if self.state == ConnectionState::Disconnected {
            return Vec::new();
        }

        let closing = self.generation;
        self.generation += 1;
        self.state = ConnectionState::Disconnected;

        vec![
            ConnectionAction::CloseTransport { generation: closing },
            ConnectionAction::StateChanged(ConnectionState::Disconnected),
        ]
    }

    fn open(&mut self) -> Vec<ConnectionAction> {
        debug_assert_eq!(self.state, ConnectionState::Disconnected);

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.retry = Retry::Idle;

        vec![
            ConnectionAction::OpenTransport { generation: self.generation },
            ConnectionAction::StateChanged(ConnectionState::Connecting),
        ]
    }

    fn check_generation(&self, generation: u64) -> Result<(), ConnectionError> {
        if generation == self.generation {
            Ok(())
        } else {
            Err(ConnectionError::StaleTransport { current: self.generation, received: generation })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy { delay: Duration::from_secs(3), max_attempts: 2 }
    }

    fn connected() -> Connection<Instant> {
        let mut conn = Connection::new(policy());
        conn.connect();
        conn.handle_open(conn.generation()).unwrap();
        conn
    }

    #[test]
    fn connection_lifecycle() {
        let mut conn: Connection<Instant> = Connection::new(policy());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let actions = conn.connect();
        assert_eq!(actions, vec![
            ConnectionAction::OpenTransport { generation: 1 },
            ConnectionAction::StateChanged(ConnectionState::Connecting),
        ]);

        let actions = conn.handle_open(1).unwrap();
        assert_eq!(actions, vec![ConnectionAction::StateChanged(ConnectionState::Connected)]);
        assert_eq!(conn.state(), ConnectionState::Connected);
    }

    #[test]
    fn connect_is_idempotent_while_open_or_opening() {
        let mut conn: Connection<Instant> = Connection::new(policy());
        assert!(!conn.connect().is_empty());
        assert!(conn.connect().is_empty());

        conn.handle_open(1).unwrap();
        assert!(conn.connect().is_empty());
        assert_eq!(conn.generation(), 1);
    }

    #[test]
    fn unexpected_close_schedules_single_retry() {
        let t0 = Instant::now();
        let mut conn = connected();

        let actions = conn.handle_closed(1, t0).unwrap();
        assert_eq!(actions, vec![
            ConnectionAction::StateChanged(ConnectionState::Disconnected),
            ConnectionAction::ReconnectScheduled { attempt: 1, delay: Duration::from_secs(3) },
        ]);

        // Error and close both fire for one failure
        assert!(conn.handle_closed(1, t0).unwrap().is_empty());

        assert!(conn.tick(t0 + Duration::from_secs(2)).is_empty());

        let actions = conn.tick(t0 + Duration::from_secs(3));
        assert_eq!(actions[0], ConnectionAction::OpenTransport { generation: 2 });
        assert_eq!(conn.attempts(), 1);
        assert!(!conn.is_reconnect_pending());
    }

    #[test]
    fn retries_stop_at_max_attempts() {
        let t0 = Instant::now();
        let mut conn = connected();
        let step = Duration::from_secs(3);

        conn.handle_closed(1, t0).unwrap();
        conn.tick(t0 + step);
        conn.handle_closed(2, t0 + step).unwrap();
        conn.tick(t0 + step * 2);

        let actions = conn.handle_closed(3, t0 + step * 2).unwrap();
        assert_eq!(actions.last(), Some(&ConnectionAction::ReconnectExhausted { attempts: 2 }));
        assert!(conn.is_exhausted());
        assert!(!conn.expects_transport());
        assert!(conn.tick(t0 + step * 10).is_empty());
    }

    #[test]
    fn successful_open_resets_attempts() {
        let t0 = Instant::now();
        let mut conn = connected();

        conn.handle_closed(1, t0).unwrap();
        conn.tick(t0 + Duration::from_secs(3));
        conn.handle_open(2).unwrap();

        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn manual_connect_after_exhaustion_starts_over() {
        let t0 = Instant::now();
        let mut conn: Connection<Instant> =
            Connection::new(ReconnectPolicy { delay: Duration::from_secs(1), max_attempts: 0 });
        conn.connect();
        let actions = conn.handle_closed(1, t0).unwrap();
        assert_eq!(actions.last(), Some(&ConnectionAction::ReconnectExhausted { attempts: 0 }));

        let actions = conn.connect();
        assert_eq!(actions[0], ConnectionAction::OpenTransport { generation: 2 });
        assert!(!conn.is_exhausted());
    }

    #[test]
    fn disconnect_cancels_retry_and_rejects_late_close() {
        let t0 = Instant::now();
        let mut conn = connected();

        let actions = conn.disconnect();
        assert_eq!(actions[0], ConnectionAction::CloseTransport { generation: 1 });

        let late = conn.handle_closed(1, t0);
        assert!(matches!(late, Err(ref e) if e.is_stale()));
        assert!(conn.tick(t0 + Duration::from_secs(60)).is_empty());
        assert!(!conn.expects_transport());
    }

    #[test]
    fn disconnect_while_retry_pending_cancels_it() {
        let t0 = Instant::now();
        let mut conn = connected();
        conn.handle_closed(1, t0).unwrap();
        assert!(conn.is_reconnect_pending());

        assert!(conn.disconnect().is_empty());
        assert!(!conn.is_reconnect_pending());
        assert!(conn.tick(t0 + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn open_from_wrong_state_is_rejected() {
        let mut conn = connected();
        assert!(matches!(
            conn.handle_open(1),
            Err(ConnectionError::InvalidState { state: ConnectionState::Connected, .. })
        ));
    }
}
