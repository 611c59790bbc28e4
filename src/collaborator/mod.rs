pub mod rest;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::models::EntryAction;

pub use rest::RestCollaborator;

/// Entry record exactly as the collaborator sent it.
pub type RawEntry = Map<String, Value>;

/// Opaque login material, forwarded to the collaborator untouched.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The remote queue/job API.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Returns `Ok(false)` when the credentials were rejected.
    async fn login(&self, credentials: &Credentials) -> Result<bool, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
    async fn get_config(&self) -> Result<Map<String, Value>, ClientError>;
    async fn fetch_queue(&self) -> Result<Vec<RawEntry>, ClientError>;
    /// `Ok(None)` means the collaborator answered without an entry.
    async fn submit_action(
        &self,
        entry_id: &str,
        action: EntryAction,
    ) -> Result<Option<RawEntry>, ClientError>;
}
