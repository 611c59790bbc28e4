use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::clamp_refresh;

pub type RefreshFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Running periodic trigger. Dropping or cancelling it stops the timer.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    fn spawn(period: Duration, trigger: RefreshFn) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // In-flight refreshes are not cancelled when the trigger stops.
                        tokio::spawn(trigger());
                    }
                    _ = stop.changed() => break,
                }
            }

            tracing::debug!("Auto-refresh timer released");
        });

        Self { shutdown, task }
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
    }
}

/// Optional periodic refresh. Toggling never fires a refresh by itself; the
/// first automatic refresh happens one full interval after enabling.
pub struct AutoRefresh {
    interval: Duration,
    trigger: RefreshFn,
    handle: Option<RefreshHandle>,
}

impl AutoRefresh {
    pub fn new(interval: Duration, trigger: RefreshFn) -> Self {
        Self {
            interval: clamp_refresh(interval),
            trigger,
            handle: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.is_enabled() {
            return;
        }

        if enabled {
            self.handle = Some(RefreshHandle::spawn(self.interval, self.trigger.clone()));
            tracing::info!("Auto-refresh enabled every {:?}", self.interval);
        } else {
            if let Some(handle) = self.handle.take() {
                handle.cancel();
            }
            tracing::info!("Auto-refresh disabled");
        }
    }

    pub fn enable(&mut self) {
        self.set_enabled(true);
    }

    pub fn disable(&mut self) {
        self.set_enabled(false);
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = clamp_refresh(interval);
        self.restart();
    }

    /// Refresh immediately and push the next automatic refresh a full interval out.
    pub async fn refresh_now(&mut self) {
        self.restart();
        (self.trigger)().await;
    }

    fn restart(&mut self) {
        if self.is_enabled() {
            self.handle = None;
            self.handle = Some(RefreshHandle::spawn(self.interval, self.trigger.clone()));
        }
    }
}
