//! Connector with fault injection.
//!
//! `SimConnector` opens transports on a [`SimServer`] for one user. Tests
//! script failures up front (refuse the next N attempts, refuse everything)
//! or enable seeded chaos, where each attempt is refused with a fixed
//! probability drawn from a `ChaCha8Rng`. The same seed always produces the
//! same refusal pattern.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use commitfield_client::{Connector, Transport, error::TransportError};
use commitfield_core::UserId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::SimServer;

#[derive(Debug, Default)]
struct Faults {
    refuse_next: u32,
    refuse_all: bool,
    chaos: Option<(ChaCha8Rng, f64)>,
    attempts: u32,
    refused: u32,
}

impl Faults {
    fn refuse(&mut self) -> bool {
        self.attempts += 1;

        let refused = if self.refuse_all {
            true
        } else if self.refuse_next > 0 {
            self.refuse_next -= 1;
            true
        } else if let Some((rng, rate)) = &mut self.chaos {
            rng.gen_bool(*rate)
        } else {
            false
        };

        if refused {
            self.refused += 1;
        }
        refused
    }
}

/// Connector onto a [`SimServer`].
#[derive(Debug, Clone)]
pub struct SimConnector {
    server: SimServer,
    user_id: UserId,
    faults: Arc<Mutex<Faults>>,
}

impl SimConnector {
    /// Connector for `user_id` that never fails.
    pub fn new(server: SimServer, user_id: UserId) -> Self {
        Self { server, user_id, faults: Arc::default() }
    }

    /// Refuse each attempt with probability `rate`, seeded for replay.
    #[must_use]
    pub fn with_chaos(self, seed: u64, rate: f64) -> Self {
        self.faults().chaos = Some((ChaCha8Rng::seed_from_u64(seed), rate.clamp(0.0, 1.0)));
        self
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse the next `count` attempts.
    pub fn refuse_next(&self, count: u32) {
        self.faults().refuse_next = count;
    }

    /// Refuse every attempt until turned off.
    pub fn refuse_all(&self, refuse: bool) {
        self.faults().refuse_all = refuse;
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.faults().attempts
    }

    /// Attempts refused so far.
    pub fn refused(&self) -> u32 {
        self.faults().refused
    }
}

impl Connector for SimConnector {
    fn connect(&self) -> impl Future<Output = Result<Transport, TransportError>> + Send {
        let refused = self.faults().refuse();
        let server = self.server.clone();
        let user_id = self.user_id;

        async move {
            if refused {
                tracing::debug!(user_id, "sim connect refused");
                return Err(TransportError::Connection("connection refused".into()));
            }
            Ok(server.accept(user_id))
        }
    }
}
