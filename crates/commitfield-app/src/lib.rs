//! Application layer for CommitField chat
//!
//! Pure view-models and a generic runtime for UI and service orchestration,
//! enabling deterministic simulation testing with the same code that runs in
//! production.
//!
//! # Components
//!
//! - [`App`]: top-level state machine (room list, open room, notices)
//! - [`RoomListView`]: tabs, paging and the join flow
//! - [`ChatRoomView`]: history paging, optimistic sends, room commands
//! - [`ProfileView`]: season stats and pet, fed by the commit channel
//! - [`Driver`]: trait for platform-specific I/O abstraction
//! - [`Runtime`]: generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
pub mod create_form;
mod driver;
mod error;
mod event;
pub mod grouping;
pub mod profile;
pub mod room_list;
pub mod room_view;
pub mod runtime;

pub use action::{AppAction, Scroll};
pub use app::{App, LOGGED_OUT, MAX_NOTICES, Panel, SESSION_EXPIRED, SessionState};
pub use create_form::{CreateRoomInput, FormErrors};
pub use driver::Driver;
pub use error::RuntimeError;
pub use event::AppEvent;
pub use profile::ProfileView;
pub use room_list::RoomListView;
pub use room_view::ChatRoomView;
pub use runtime::Runtime;
