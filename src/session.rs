use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use tokio::task::JoinHandle;

use crate::collaborator::{Collaborator, Credentials};
use crate::config::SessionSettings;
use crate::coordinator::ActionCoordinator;
use crate::countdown::CountdownTimer;
use crate::error::ClientError;
use crate::queue::{AutoRefresh, QueueSnapshot, QueueSynchronizer, RefreshFn};

pub type SharedSession = Arc<Session>;

/// One operator session: authentication, inactivity countdown, queue and actions.
pub struct Session {
    collaborator: Arc<dyn Collaborator>,
    settings: SessionSettings,
    countdown: CountdownTimer,
    queue: Arc<QueueSynchronizer>,
    actions: Arc<ActionCoordinator>,
    authenticated: AtomicBool,
}

impl Session {
    /// Read settings from the collaborator once, then build the session.
    /// Unreachable or malformed settings fall back to defaults.
    pub async fn connect(collaborator: Arc<dyn Collaborator>) -> Self {
        let settings = match collaborator.get_config().await {
            Ok(raw) => SessionSettings::from_remote(raw),
            Err(e) => {
                tracing::warn!("Could not load server settings, using defaults: {e}");
                SessionSettings::fallback()
            }
        };

        tracing::info!(
            "Session settings: timeout {}s, refresh every {:?}",
            settings.timeout_secs,
            settings.refresh_interval
        );

        Self::new(collaborator, settings)
    }

    pub fn new(collaborator: Arc<dyn Collaborator>, settings: SessionSettings) -> Self {
        let queue = Arc::new(QueueSynchronizer::new(collaborator.clone()));
        let actions = Arc::new(ActionCoordinator::new(collaborator.clone(), queue.clone()));

        Self {
            countdown: CountdownTimer::spawn(settings.timeout_secs),
            collaborator,
            settings,
            queue,
            actions,
            authenticated: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn countdown(&self) -> &CountdownTimer {
        &self.countdown
    }

    pub fn queue(&self) -> &Arc<QueueSynchronizer> {
        &self.queue
    }

    pub fn actions(&self) -> &Arc<ActionCoordinator> {
        &self.actions
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<bool, ClientError> {
        let result = self.collaborator.login(credentials).await;
        let success = matches!(result, Ok(true));

        self.authenticated.store(success, Ordering::SeqCst);
        if success {
            tracing::info!("Logged in as {}", credentials.username);
            self.countdown.start();
        } else {
            tracing::warn!("Login failed for {}", credentials.username);
            self.countdown.stop();
        }
        result
    }

    /// Stops the countdown and tells the collaborator. Remote failures are only logged.
    pub async fn logout(&self) {
        let was_authenticated = self.authenticated.swap(false, Ordering::SeqCst);
        self.countdown.stop();

        if !was_authenticated {
            return;
        }

        if let Err(e) = self.collaborator.logout().await {
            tracing::warn!("Logout request failed: {e}");
        }
        tracing::info!("Logged out");
    }

    /// User-activity signal.
    pub fn activity(&self) {
        if self.is_authenticated() {
            self.countdown.reset();
        }
    }

    pub async fn refresh(&self) -> Result<QueueSnapshot, ClientError> {
        if !self.is_authenticated() {
            return Err(ClientError::NotLoggedIn);
        }
        self.queue.refresh().await
    }

    /// Build a periodic refresher at the configured interval. The caller owns it.
    pub fn auto_refresh(self: &Arc<Self>) -> AutoRefresh {
        let session = Arc::downgrade(self);
        let trigger: RefreshFn = Arc::new(move || refresh_weak(session.clone()).boxed());
        AutoRefresh::new(self.settings.refresh_interval, trigger)
    }

    /// Force a logout whenever the countdown expires.
    pub fn watch_expiry(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::downgrade(self);
        let mut expirations = self.countdown.expirations();

        tokio::spawn(async move {
            while expirations.changed().await.is_ok() {
                let Some(session) = session.upgrade() else {
                    break;
                };
                tracing::warn!("Session timed out after inactivity");
                session.logout().await;
            }
        })
    }
}

async fn refresh_weak(session: Weak<Session>) {
    let Some(session) = session.upgrade() else {
        return;
    };
    if let Err(e) = session.refresh().await {
        tracing::debug!("Automatic refresh failed: {e}");
    }
}
