use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use super::filter::StatusFilter;
use super::normalize::normalize_entry;
use crate::collaborator::Collaborator;
use crate::error::ClientError;
use crate::models::{EntryAction, EntryStatus, QueueEntry};

/// Immutable copy of the remote queue. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    entries: Arc<Vec<QueueEntry>>,
    generation: u64,
}

impl QueueSnapshot {
    fn new(entries: Vec<QueueEntry>, generation: u64) -> Self {
        Self {
            entries: Arc::new(entries),
            generation,
        }
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Increases every time the snapshot is replaced. Zero before the first fetch.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Everything the presentation layer observes about the queue, published as one
/// value. The message, the selection, the in-flight action and the data they
/// refer to always change together.
#[derive(Debug, Clone, Default)]
pub struct QueueState {
    pub snapshot: QueueSnapshot,
    pub filter: StatusFilter,
    /// The single transient message, from the last failed refresh or action.
    pub message: Option<String>,
    /// Id of the selected entry. Always present in `snapshot` when set.
    pub selection: Option<String>,
    /// Action in flight and the entry it targets.
    pub in_flight: Option<(String, EntryAction)>,
    loads: usize,
}

impl QueueState {
    /// True while at least one fetch is outstanding.
    pub fn loading(&self) -> bool {
        self.loads > 0
    }

    pub fn busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Entries passing the current filter, in snapshot order.
    pub fn visible(&self) -> Vec<QueueEntry> {
        self.filter.apply(self.snapshot.entries()).cloned().collect()
    }

    pub fn selected(&self) -> Option<&QueueEntry> {
        self.snapshot.get(self.selection.as_deref()?)
    }

    fn reconcile_selection(&mut self) {
        if let Some(id) = self.selection.as_deref()
            && !self.snapshot.contains(id)
        {
            tracing::debug!("Selected entry {id} left the queue");
            self.selection = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Removed,
    Replaced,
    Inserted,
    Unchanged,
}

/// Owns the queue snapshot and keeps it in step with the collaborator.
pub struct QueueSynchronizer {
    collaborator: Arc<dyn Collaborator>,
    state: watch::Sender<QueueState>,
    generation: AtomicU64,
}

impl QueueSynchronizer {
    pub fn new(collaborator: Arc<dyn Collaborator>) -> Self {
        let (state, _) = watch::channel(QueueState::default());
        Self {
            collaborator,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> QueueState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.state.borrow().snapshot.clone()
    }

    pub fn visible(&self) -> Vec<QueueEntry> {
        self.state.borrow().visible()
    }

    pub fn message(&self) -> Option<String> {
        self.state.borrow().message.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading()
    }

    pub fn busy(&self) -> bool {
        self.state.borrow().busy()
    }

    pub(crate) fn sender(&self) -> &watch::Sender<QueueState> {
        &self.state
    }

    /// Fetch the whole queue and replace the snapshot.
    ///
    /// On failure the previous snapshot stays as it was and the failure text is
    /// published. A selection whose entry is gone is dropped with the
    /// replacement. There is no retry; callers re-invoke. Overlapping calls
    /// are allowed and the last one to complete wins.
    pub async fn refresh(&self) -> Result<QueueSnapshot, ClientError> {
        let load = PendingLoad::begin(&self.state);

        match self.collaborator.fetch_queue().await {
            Ok(records) => {
                let entries: Vec<QueueEntry> = records
                    .iter()
                    .filter_map(|record| {
                        let entry = normalize_entry(record);
                        if entry.is_none() {
                            tracing::warn!("Dropping queue record without an id");
                        }
                        entry
                    })
                    .collect();

                let snapshot = QueueSnapshot::new(entries, self.next_generation());
                let published = snapshot.clone();
                load.finish(move |state| {
                    state.snapshot = published;
                    state.message = None;
                    state.reconcile_selection();
                });

                tracing::debug!(
                    "Queue refreshed: {} entries (generation {})",
                    snapshot.len(),
                    snapshot.generation()
                );
                Ok(snapshot)
            }
            Err(e) => {
                tracing::warn!("Queue refresh failed: {e}");
                let message = e.message();
                load.finish(move |state| state.message = Some(message));
                Err(e)
            }
        }
    }

    /// Fold an action result into the snapshot by entry id.
    ///
    /// A missing response or a DELETED entry removes `target_id`; a known id is
    /// replaced in place; an unknown id is appended. Applying the same response
    /// twice leaves the snapshot as after the first application.
    pub fn apply_entry(&self, target_id: &str, response: Option<QueueEntry>) -> MergeOutcome {
        let mut outcome = MergeOutcome::Unchanged;
        self.state.send_if_modified(|state| {
            outcome = self.merge_into(state, target_id, response);
            outcome != MergeOutcome::Unchanged
        });
        outcome
    }

    /// Merge into a state that is already being modified, so callers can
    /// publish the merge together with their own changes.
    pub(crate) fn merge_into(
        &self,
        state: &mut QueueState,
        target_id: &str,
        response: Option<QueueEntry>,
    ) -> MergeOutcome {
        let Some((entries, outcome)) = merge(state.snapshot.entries(), target_id, response) else {
            return MergeOutcome::Unchanged;
        };
        state.snapshot = QueueSnapshot::new(entries, self.next_generation());
        state.reconcile_selection();
        outcome
    }

    pub fn set_filter(&self, filter: StatusFilter) {
        self.state.send_if_modified(|state| {
            if state.filter == filter {
                return false;
            }
            state.filter = filter;
            true
        });
    }

    /// Returns whether `status` is now part of the filter.
    pub fn toggle_filter(&self, status: EntryStatus) -> bool {
        let mut included = false;
        self.state.send_modify(|state| included = state.filter.toggle(status));
        included
    }

    pub fn clear_filter(&self) {
        self.set_filter(StatusFilter::new());
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Returns the merged entry list, or `None` when the response changes nothing.
fn merge(
    entries: &[QueueEntry],
    target_id: &str,
    response: Option<QueueEntry>,
) -> Option<(Vec<QueueEntry>, MergeOutcome)> {
    let removal = match &response {
        None => Some(target_id),
        Some(entry) if entry.is_deleted() => Some(entry.id.as_str()),
        Some(_) => None,
    };

    if let Some(id) = removal {
        if !entries.iter().any(|e| e.id == id) {
            return None;
        }
        let kept = entries.iter().filter(|e| e.id != id).cloned().collect();
        return Some((kept, MergeOutcome::Removed));
    }

    let entry = response?;
    match entries.iter().position(|e| e.id == entry.id) {
        Some(i) if entries[i] == entry => None,
        Some(i) => {
            let mut next = entries.to_vec();
            next[i] = entry;
            Some((next, MergeOutcome::Replaced))
        }
        None => {
            let mut next = entries.to_vec();
            next.push(entry);
            Some((next, MergeOutcome::Inserted))
        }
    }
}

/// Tracks one outstanding fetch. The loading flag drops with the last one,
/// including when the fetch future is dropped before completing.
struct PendingLoad<'a> {
    state: &'a watch::Sender<QueueState>,
    finished: bool,
}

impl<'a> PendingLoad<'a> {
    fn begin(state: &'a watch::Sender<QueueState>) -> Self {
        state.send_modify(|s| s.loads += 1);
        Self {
            state,
            finished: false,
        }
    }

    fn finish(mut self, apply: impl FnOnce(&mut QueueState)) {
        self.finished = true;
        self.state.send_modify(|s| {
            s.loads = s.loads.saturating_sub(1);
            apply(s);
        });
    }
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_modify(|s| s.loads = s.loads.saturating_sub(1));
        }
    }
}
