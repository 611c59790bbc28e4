use std::collections::BTreeSet;

use crate::models::{EntryStatus, QueueEntry};

/// Set of statuses the operator wants to see. Empty means no filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFilter {
    statuses: BTreeSet<EntryStatus>,
}

impl StatusFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(statuses: impl IntoIterator<Item = EntryStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Flip membership of `status`; returns whether it is now included.
    pub fn toggle(&mut self, status: EntryStatus) -> bool {
        if self.statuses.remove(&status) {
            false
        } else {
            self.statuses.insert(status);
            true
        }
    }

    /// Entries with an unrecognised status only pass an empty filter.
    pub fn include_entry(&self, entry: &QueueEntry) -> bool {
        if self.statuses.is_empty() {
            return true;
        }
        entry.status.is_some_and(|s| self.statuses.contains(&s))
    }

    pub fn apply<'a>(&'a self, entries: &'a [QueueEntry]) -> impl Iterator<Item = &'a QueueEntry> + 'a {
        entries.iter().filter(move |e| self.include_entry(e))
    }
}
