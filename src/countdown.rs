use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Remaining-seconds value published while the timer is not running.
pub const INACTIVE: i64 = -1;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Remaining(i64),
    Expired,
    Stopped,
}

/// Inactivity countdown as a plain state machine. `remaining` is `INACTIVE`
/// or a value in `1..=ceiling`.
#[derive(Debug, Clone)]
pub struct Countdown {
    ceiling: i64,
    remaining: i64,
}

impl Countdown {
    pub fn new(ceiling: i64) -> Self {
        Self {
            ceiling,
            remaining: INACTIVE,
        }
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    pub fn is_active(&self) -> bool {
        self.remaining != INACTIVE
    }

    /// A ceiling of zero or less disables the timer for good.
    pub fn start(&mut self) -> Transition {
        if self.ceiling <= 0 {
            return Transition::Unchanged;
        }
        self.remaining = self.ceiling;
        Transition::Remaining(self.remaining)
    }

    pub fn tick(&mut self) -> Transition {
        if !self.is_active() {
            return Transition::Unchanged;
        }

        let next = self.remaining - 1;
        if next > 0 {
            self.remaining = next;
            Transition::Remaining(next)
        } else {
            self.remaining = INACTIVE;
            Transition::Expired
        }
    }

    /// No effect once inactive, so activity after an expiry cannot revive the session.
    pub fn reset(&mut self) -> Transition {
        if !self.is_active() {
            return Transition::Unchanged;
        }
        self.remaining = self.ceiling;
        Transition::Remaining(self.remaining)
    }

    pub fn stop(&mut self) -> Transition {
        if !self.is_active() {
            return Transition::Unchanged;
        }
        self.remaining = INACTIVE;
        Transition::Stopped
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Start,
    Reset,
    Stop,
}

/// Handle to a running countdown task.
///
/// Commands are processed ahead of a tick that becomes due at the same time,
/// so activity reported in the final second still counts.
pub struct CountdownTimer {
    ceiling: i64,
    commands: mpsc::UnboundedSender<Command>,
    remaining: watch::Receiver<i64>,
    expirations: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    pub fn spawn(ceiling: i64) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (remaining_tx, remaining) = watch::channel(INACTIVE);
        let (expired_tx, expirations) = watch::channel(0u64);

        let task = tokio::spawn(run(Countdown::new(ceiling), rx, remaining_tx, expired_tx));

        Self {
            ceiling,
            commands,
            remaining,
            expirations,
            task,
        }
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    pub fn is_enabled(&self) -> bool {
        self.ceiling > 0
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// User-activity signal.
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn remaining(&self) -> i64 {
        *self.remaining.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.remaining() != INACTIVE
    }

    /// Active and below `threshold` seconds.
    pub fn is_expiring_soon(&self, threshold: i64) -> bool {
        let remaining = self.remaining();
        remaining >= 0 && remaining < threshold
    }

    /// Remaining-seconds changes. Values are coalesced: a reader that falls
    /// behind sees the latest value, not every intermediate one.
    pub fn subscribe(&self) -> CountdownWatch {
        CountdownWatch {
            rx: self.remaining.clone(),
            below: None,
        }
    }

    /// Only active values below `threshold`; never yields while inactive.
    pub fn subscribe_below(&self, threshold: i64) -> CountdownWatch {
        CountdownWatch {
            rx: self.remaining.clone(),
            below: Some(threshold),
        }
    }

    /// Counter bumped on every expiry.
    pub fn expirations(&self) -> watch::Receiver<u64> {
        self.expirations.clone()
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Countdown task is gone; dropping {command:?}");
        }
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut countdown: Countdown,
    mut commands: mpsc::UnboundedReceiver<Command>,
    remaining: watch::Sender<i64>,
    expirations: watch::Sender<u64>,
) {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let transition = tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else { break };
                let was_active = countdown.is_active();
                let transition = match command {
                    Command::Start => countdown.start(),
                    Command::Reset => countdown.reset(),
                    Command::Stop => countdown.stop(),
                };
                if !was_active && countdown.is_active() {
                    ticker.reset();
                    tracing::info!("Session countdown started at {}s", countdown.ceiling());
                }
                transition
            }
            _ = ticker.tick(), if countdown.is_active() => countdown.tick(),
        };

        match transition {
            Transition::Unchanged => {}
            Transition::Remaining(secs) => {
                remaining.send_replace(secs);
            }
            Transition::Stopped => {
                tracing::debug!("Session countdown stopped");
                remaining.send_replace(INACTIVE);
            }
            Transition::Expired => {
                tracing::warn!("Session countdown expired");
                remaining.send_replace(INACTIVE);
                expirations.send_modify(|n| *n += 1);
            }
        }
    }
}

/// Receiver side of the countdown, optionally limited to a "closing soon" window.
///
/// Backed by a `watch` channel, so only the most recent value is kept. Anyone
/// who needs to act on expiry should watch `CountdownTimer::expirations`,
/// which counts every expiry.
#[derive(Clone)]
pub struct CountdownWatch {
    rx: watch::Receiver<i64>,
    below: Option<i64>,
}

impl CountdownWatch {
    /// Waits for the next accepted value. Values published while the caller was
    /// not waiting may be skipped. `None` once the timer is gone.
    pub async fn next(&mut self) -> Option<i64> {
        loop {
            self.rx.changed().await.ok()?;
            let remaining = *self.rx.borrow_and_update();
            if self.accepts(remaining) {
                return Some(remaining);
            }
        }
    }

    pub fn current(&self) -> i64 {
        *self.rx.borrow()
    }

    pub fn is_expiring_soon(&self) -> bool {
        self.below.is_some() && self.accepts(self.current())
    }

    fn accepts(&self, remaining: i64) -> bool {
        match self.below {
            Some(threshold) => remaining >= 0 && remaining < threshold,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_on_the_ceiling_tick() {
        let mut c = Countdown::new(30);
        c.start();
        for _ in 0..29 {
            assert_ne!(c.tick(), Transition::Expired);
        }
        assert_eq!(c.remaining(), 1);
        assert_eq!(c.tick(), Transition::Expired);
        assert_eq!(c.remaining(), INACTIVE);
    }

    #[test]
    fn reset_restores_ceiling() {
        let mut c = Countdown::new(30);
        c.start();
        for _ in 0..15 {
            c.tick();
        }
        assert_eq!(c.reset(), Transition::Remaining(30));
        for _ in 0..29 {
            c.tick();
        }
        assert_eq!(c.remaining(), 1);
    }

    #[test]
    fn disabled_timer_never_runs() {
        let mut c = Countdown::new(0);
        assert_eq!(c.start(), Transition::Unchanged);
        for _ in 0..100 {
            assert_eq!(c.tick(), Transition::Unchanged);
        }
        assert_eq!(c.remaining(), INACTIVE);
    }

    #[test]
    fn reset_after_expiry_is_ignored() {
        let mut c = Countdown::new(1);
        c.start();
        assert_eq!(c.tick(), Transition::Expired);
        assert_eq!(c.reset(), Transition::Unchanged);
        assert!(!c.is_active());
    }

    #[test]
    fn stop_goes_inactive() {
        let mut c = Countdown::new(10);
        c.start();
        assert_eq!(c.stop(), Transition::Stopped);
        assert_eq!(c.remaining(), INACTIVE);
        assert_eq!(c.stop(), Transition::Unchanged);
    }
}
