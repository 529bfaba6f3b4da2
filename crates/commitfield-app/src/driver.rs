//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from a specific
//! frontend. Each frontend implements it to read user input and present
//! state, while the generic [`crate::Runtime`] handles all orchestration.

use std::future::Future;

use crate::{App, AppEvent, Scroll};

/// Abstracts user-facing I/O for the application runtime.
///
/// # Implementations
///
/// - **CLI**: line-based stdin commands, transcript on stdout
/// - **Simulation**: scripted events and recorded output
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Wait briefly for the next user event.
    ///
    /// Returns `None` if nothing arrived within the driver's poll interval,
    /// so the runtime can process background results.
    fn poll_event(&mut self) -> impl Future<Output = Result<Option<AppEvent>, Self::Error>> + Send;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;

    /// Show a blocking alert.
    fn alert(&mut self, message: &str) -> Result<(), Self::Error>;

    /// Ask for confirmation. The answer is a later `Confirm` or `Cancel`
    /// event.
    fn confirm(&mut self, prompt: &str) -> Result<(), Self::Error>;

    /// Move the message viewport.
    fn scroll(&mut self, scroll: Scroll) -> Result<(), Self::Error>;

    /// Release resources before exit.
    fn stop(&mut self);
}
