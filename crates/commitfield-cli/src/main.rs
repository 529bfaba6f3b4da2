//! CommitField terminal client entry point.
//!
//! # Usage
//!
//! ```bash
//! # Session cookie copied from a browser login
//! COMMITFIELD_SESSION=... commitfield --user-id 7 --nickname kim
//!
//! # Against another backend, with debug logs on stderr
//! commitfield --api-base-url https://api.example.com --user-id 7 --nickname kim \
//!     --log-level debug
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use commitfield_cli::CliError;
use commitfield_client::{
    ClientConfig, Identity, UserId,
    config::{DEFAULT_API_BASE_URL, DEFAULT_WS_PATH},
};
use commitfield_core::connection::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// CommitField chat client
#[derive(Parser, Debug)]
#[command(name = "commitfield")]
#[command(about = "Terminal client for CommitField chat rooms")]
#[command(version)]
struct Args {
    /// REST base URL; the WebSocket URL is derived from it
    #[arg(long, env = "COMMITFIELD_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// WebSocket endpoint path
    #[arg(long, default_value = DEFAULT_WS_PATH)]
    ws_path: String,

    /// Session cookie value from a browser login
    #[arg(long, env = "COMMITFIELD_SESSION", hide_env_values = true)]
    session: Option<String>,

    /// Backend user id
    #[arg(long, env = "COMMITFIELD_USER_ID")]
    user_id: UserId,

    /// Display name sent with each message
    #[arg(long, env = "COMMITFIELD_NICKNAME")]
    nickname: String,

    /// Local message cache directory
    #[arg(long, env = "COMMITFIELD_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Seconds between reconnection attempts
    #[arg(long, default_value_t = DEFAULT_RECONNECT_DELAY.as_secs())]
    reconnect_delay: u64,

    /// Reconnection attempts before sending over REST
    #[arg(long, default_value_t = DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    max_reconnect_attempts: u32,

    /// Do not subscribe to the notification channel
    #[arg(long)]
    no_notifications: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.api_base_url.clone(),
            ws_path: self.ws_path.clone(),
            reconnect_delay: Duration::from_secs(self.reconnect_delay),
            max_reconnect_attempts: self.max_reconnect_attempts,
            notifications: !self.no_notifications,
            cache_dir: self.cache_dir.clone(),
            ..ClientConfig::default()
        }
    }

    fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            nickname: self.nickname.clone(),
            session: self.session.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    commitfield_cli::run(args.config(), args.identity()).await
}
