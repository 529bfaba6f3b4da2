//! Runtime errors.

use commitfield_client::ServiceError;
use thiserror::Error;

/// Errors that end the runtime loop.
#[derive(Error, Debug)]
pub enum RuntimeError<E: std::error::Error + 'static> {
    /// Frontend failure.
    #[error("driver error: {0}")]
    Driver(#[source] E),

    /// Chat service stopped underneath the runtime.
    #[error(transparent)]
    Service(#[from] ServiceError),
}
