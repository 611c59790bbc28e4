pub mod config;
pub mod error;
pub mod session;
pub mod models;
pub mod collaborator;
pub mod queue;
pub mod countdown;
pub mod coordinator;
pub mod console;

use std::sync::Arc;

use crate::collaborator::{Collaborator, RestCollaborator};
use crate::config::Config;
use crate::error::ClientError;
use crate::session::{Session, SharedSession};

/// Build a session over any collaborator. Countdown expiry forces a logout;
/// the watcher stops together with the session's countdown.
pub async fn build_session_with(collaborator: Arc<dyn Collaborator>) -> SharedSession {
    let session = Arc::new(Session::connect(collaborator).await);
    session.watch_expiry();
    session
}

/// Connect to the configured server and prepare a session (not yet logged in).
pub async fn build_session(config: &Config) -> Result<SharedSession, ClientError> {
    let collaborator = RestCollaborator::new(&config.server_url, config.http_timeout)?;
    tracing::info!(
        "Using server {} (client id {})",
        config.server_url,
        collaborator.client_id()
    );

    Ok(build_session_with(Arc::new(collaborator)).await)
}
