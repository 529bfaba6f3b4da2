//! Simulated environment over tokio's clock.
//!
//! Monotonic time is `tokio::time::Instant`, so tests running under
//! `#[tokio::test(start_paused = true)]` advance it virtually. The wall clock
//! starts at a fixed instant and moves with monotonic time, which keeps
//! timestamps and placeholder ids reproducible.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use commitfield_core::env::Environment;
use tokio::time::Instant;

/// Wall-clock start of every simulation: 2024-05-01T00:00:00Z.
pub const SIM_EPOCH_SECS: i64 = 1_714_521_600;

/// Deterministic environment for simulation.
#[derive(Debug, Clone, Copy)]
pub struct SimEnv {
    started: Instant,
    wall_start: DateTime<Utc>,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Environment whose wall clock starts at [`SIM_EPOCH_SECS`].
    pub fn new() -> Self {
        let wall_start = Utc.timestamp_opt(SIM_EPOCH_SECS, 0).single().unwrap_or_default();
        Self::starting_at(wall_start)
    }

    /// Environment whose wall clock starts at `wall_start`.
    pub fn starting_at(wall_start: DateTime<Utc>) -> Self {
        Self { started: Instant::now(), wall_start }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Instant::now() - self.started
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or_default();
        self.wall_start + elapsed
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
