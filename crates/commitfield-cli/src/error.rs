//! CLI errors.

use std::io;

use commitfield_app::RuntimeError;
use commitfield_client::error::ConfigError;
use thiserror::Error;

/// Errors that stop the client.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration cannot be used.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The runtime loop failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError<io::Error>),
}
