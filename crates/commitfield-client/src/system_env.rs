//! Production environment using the system clocks.
//!
//! Monotonic time comes from `tokio::time::Instant`, so a paused tokio clock
//! in tests drives reconnect timing the same way real time does.

use std::time::Duration;

use chrono::{DateTime, Utc};
use commitfield_core::env::Environment;

/// Production environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_monotonic_time() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_secs(3)).await;

        assert!(env.now() - start >= Duration::from_secs(3));
    }
}
