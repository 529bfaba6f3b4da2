//! Deterministic simulation harness for CommitField client testing.
//!
//! In-process implementations of the Environment, Connector, backend and
//! Driver seams. Tests run under `#[tokio::test(start_paused = true)]`, so
//! reconnect delays and polling advance in virtual time and every run is
//! reproducible.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for every
//! standard invariant.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_connector;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    ClientSnapshot, Invariant, InvariantKind, InvariantRegistry, InvariantResult, MessageSnapshot,
    NoOrphanPlaceholder, OneLiveTransport, OpenRoomOnly, SystemSnapshot, UniqueServerIds,
    Violation,
};
pub use sim_connector::SimConnector;
pub use sim_driver::{SimDriver, SimHandle, SimView};
pub use sim_env::SimEnv;
pub use sim_server::{SimBackend, SimServer};
