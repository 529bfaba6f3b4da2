//! Environment abstraction for deterministic testing.
//!
//! Decouples client logic from system resources (monotonic time, wall-clock
//! time). Production uses the system clock; simulation freezes the wall clock
//! and drives monotonic time virtually.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards.
/// - `wall_clock()` is only used for message timestamps and placeholder ids,
///   never for timeout arithmetic.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type used for reconnect timing.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time in UTC.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code sleeps. State machines take time as a parameter.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
