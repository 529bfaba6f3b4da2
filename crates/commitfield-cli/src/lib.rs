//! Terminal client for CommitField chat rooms
//!
//! A thin shell over [`commitfield_app::Driver`] that reads line commands
//! from stdin and prints the transcript to stdout. All orchestration lives in
//! the generic [`commitfield_app::Runtime`]; this crate wires it to the
//! WebSocket connector and the REST backend.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod driver;
pub mod error;
pub mod render;

use std::sync::Arc;

use chrono::Local;
use commitfield_app::{App, Runtime};
use commitfield_client::{
    ChatService, ClientConfig, Identity, SystemEnv, api::ChatApi, store::LocalStore,
    websocket::WebSocketConnector,
};

pub use command::{Command, InputContext};
pub use driver::StdioDriver;
pub use error::CliError;

/// Run the client until the user quits or stdin closes.
///
/// # Errors
///
/// - `CliError::Config` for an unusable URL or cache directory
/// - `CliError::Runtime` if the terminal or the chat service fails
pub async fn run(config: ClientConfig, identity: Identity) -> Result<(), CliError> {
    let env = SystemEnv::new();
    let connector = WebSocketConnector::new(config.ws_url()?, identity.cookie_header());
    let backend = Arc::new(ChatApi::new(&config, &identity)?);
    let store = LocalStore::new(config.resolved_cache_dir()?, config.message_cache_limit);

    let offset = *Local::now().offset();
    let app = App::new(identity.user_id, offset);
    tracing::info!(
        user_id = identity.user_id,
        api = %config.api_base_url,
        ws = %connector.url(),
        "commitfield starting"
    );

    let service = ChatService::spawn(env, connector, identity, &config);
    let driver = StdioDriver::stdio(offset);
    Runtime::new(driver, env, app, service, backend, store, &config).run().await?;

    tracing::info!("commitfield stopped");
    Ok(())
}
