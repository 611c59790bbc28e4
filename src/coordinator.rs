use std::sync::Arc;

use tokio::sync::watch;

use crate::collaborator::Collaborator;
use crate::error::ClientError;
use crate::models::{is_valid_action, EntryAction, QueueEntry};
use crate::queue::{normalize_entry, MergeOutcome, QueueState, QueueSynchronizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotPermitted,
    Busy,
    NoSelection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Nothing was sent to the collaborator.
    Skipped(SkipReason),
    Removed { id: String },
    Replaced(QueueEntry),
    Inserted(QueueEntry),
    /// The response matched what the snapshot already held.
    Unchanged,
}

/// Dispatches operator actions and owns the current selection.
///
/// Selection, busy and the message live in the synchronizer's published
/// state, so an action result lands in one update.
pub struct ActionCoordinator {
    collaborator: Arc<dyn Collaborator>,
    queue: Arc<QueueSynchronizer>,
}

impl ActionCoordinator {
    pub fn new(collaborator: Arc<dyn Collaborator>, queue: Arc<QueueSynchronizer>) -> Self {
        Self {
            collaborator,
            queue,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.queue.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.queue.busy()
    }

    /// Select an entry of the current snapshot. Refused while an action is in flight.
    pub fn select(&self, id: &str) -> bool {
        let mut accepted = false;

        self.queue.sender().send_if_modified(|state| {
            if state.busy() {
                return false;
            }
            if !state.snapshot.contains(id) {
                tracing::debug!("Ignoring selection of unknown entry {id}");
                return false;
            }
            accepted = true;
            if state.selection.as_deref() == Some(id) {
                return false;
            }
            state.selection = Some(id.to_string());
            true
        });

        accepted
    }

    pub fn clear_selection(&self) -> bool {
        let mut cleared = false;
        self.queue.sender().send_if_modified(|state| {
            if state.busy() {
                return false;
            }
            cleared = true;
            state.selection.take().is_some()
        });
        cleared
    }

    pub fn selected(&self) -> Option<QueueEntry> {
        self.queue.sender().borrow().selected().cloned()
    }

    /// Whether `action` may be requested for the current selection.
    pub fn supported(&self, action: EntryAction) -> bool {
        self.selected()
            .is_some_and(|entry| is_valid_action(entry.status, action))
    }

    pub async fn perform_selected(&self, action: EntryAction) -> Result<ActionOutcome, ClientError> {
        match self.selected() {
            Some(entry) => self.perform_action(&entry, action).await,
            None => Ok(ActionOutcome::Skipped(SkipReason::NoSelection)),
        }
    }

    /// Send `action` for `entry` and merge the result into the snapshot.
    ///
    /// Illegal actions return without touching any state or the network. Every
    /// completion publishes the merge, the message, cleared busy and cleared
    /// selection as a single update.
    pub async fn perform_action(
        &self,
        entry: &QueueEntry,
        action: EntryAction,
    ) -> Result<ActionOutcome, ClientError> {
        if !is_valid_action(entry.status, action) {
            tracing::debug!(
                "{action} not permitted for entry {} in status {:?}",
                entry.id,
                entry.status
            );
            return Ok(ActionOutcome::Skipped(SkipReason::NotPermitted));
        }

        let Some(busy) = BusyGuard::acquire(self.queue.sender(), &entry.id, action) else {
            tracing::debug!("Action {action} on {} refused: another action is in flight", entry.id);
            return Ok(ActionOutcome::Skipped(SkipReason::Busy));
        };

        tracing::info!("{} entry {}", action.progress_text(), entry.id);

        let result = self
            .collaborator
            .submit_action(&entry.id, action)
            .await
            .and_then(|raw| match raw {
                None => Ok(None),
                Some(record) => normalize_entry(&record).map(Some).ok_or_else(|| {
                    ClientError::Decode("action response has no entry id".to_string())
                }),
            });

        match result {
            Ok(response) => {
                let mut merged = MergeOutcome::Unchanged;
                let applied = response.clone();
                busy.finish(|state| {
                    merged = self.queue.merge_into(state, &entry.id, applied);
                    state.message = None;
                });

                let outcome = match merged {
                    MergeOutcome::Removed => ActionOutcome::Removed {
                        id: response.map(|e| e.id).unwrap_or_else(|| entry.id.clone()),
                    },
                    MergeOutcome::Replaced => response
                        .map(ActionOutcome::Replaced)
                        .unwrap_or(ActionOutcome::Unchanged),
                    MergeOutcome::Inserted => response
                        .map(ActionOutcome::Inserted)
                        .unwrap_or(ActionOutcome::Unchanged),
                    MergeOutcome::Unchanged => ActionOutcome::Unchanged,
                };
                tracing::info!("{action} on {} finished: {outcome:?}", entry.id);
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!("{action} on {} failed: {e}", entry.id);
                let message = e.message();
                busy.finish(|state| state.message = Some(message));
                Err(e)
            }
        }
    }
}

/// Holds the in-flight slot for one action. Finishing (or dropping) it clears
/// busy and the selection in the same update as the caller's changes.
struct BusyGuard<'a> {
    state: &'a watch::Sender<QueueState>,
    finished: bool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(state: &'a watch::Sender<QueueState>, id: &str, action: EntryAction) -> Option<Self> {
        let acquired = state.send_if_modified(|s| {
            if s.busy() {
                return false;
            }
            s.in_flight = Some((id.to_string(), action));
            true
        });

        acquired.then_some(Self {
            state,
            finished: false,
        })
    }

    fn finish(mut self, apply: impl FnOnce(&mut QueueState)) {
        self.finished = true;
        self.state.send_modify(|s| {
            apply(s);
            s.in_flight = None;
            s.selection = None;
        });
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_modify(|s| {
                s.in_flight = None;
                s.selection = None;
            });
        }
    }
}
