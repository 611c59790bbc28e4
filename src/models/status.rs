use serde::{Deserialize, Serialize};

/// Lifecycle status of a queue entry. Order matches the collaborator's wire ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    Queued,
    Running,
    Suspended,
    Completed,
    Aborted,
    Error,
    Deleted,
}

/// Operator action against a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryAction {
    Delete,
    Resume,
    Suspend,
    Abort,
    Restart,
}

impl EntryStatus {
    pub const ALL: [EntryStatus; 7] = [
        EntryStatus::Queued,
        EntryStatus::Running,
        EntryStatus::Suspended,
        EntryStatus::Completed,
        EntryStatus::Aborted,
        EntryStatus::Error,
        EntryStatus::Deleted,
    ];

    /// Map a wire ordinal to a status. Unknown ordinals yield `None`.
    pub fn from_ordinal(value: i64) -> Option<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Queued => "queued",
            EntryStatus::Running => "running",
            EntryStatus::Suspended => "suspended",
            EntryStatus::Completed => "completed",
            EntryStatus::Aborted => "aborted",
            EntryStatus::Error => "error",
            EntryStatus::Deleted => "deleted",
        }
    }

    /// Whether the entry has stopped for good (a completion timestamp is expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Completed | EntryStatus::Aborted | EntryStatus::Error | EntryStatus::Deleted
        )
    }

    /// Actions the operator may request while an entry is in this status.
    ///
    /// Adding a status fails to compile until it is given a row here.
    pub fn legal_actions(&self) -> &'static [EntryAction] {
        use EntryAction::*;

        match self {
            EntryStatus::Queued => &[Delete, Suspend, Abort],
            EntryStatus::Running => &[Suspend, Abort],
            EntryStatus::Suspended => &[Delete, Resume, Abort, Restart],
            EntryStatus::Completed => &[Delete, Restart],
            EntryStatus::Aborted => &[Delete, Resume, Restart],
            EntryStatus::Error => &[Delete, Resume, Restart],
            EntryStatus::Deleted => &[],
        }
    }

    pub fn allows(&self, action: EntryAction) -> bool {
        self.legal_actions().contains(&action)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EntryAction {
    pub const ALL: [EntryAction; 5] = [
        EntryAction::Delete,
        EntryAction::Resume,
        EntryAction::Suspend,
        EntryAction::Abort,
        EntryAction::Restart,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.wire_name().eq_ignore_ascii_case(name.trim()))
    }

    /// Name sent to the collaborator.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EntryAction::Delete => "DELETE",
            EntryAction::Resume => "RESUME",
            EntryAction::Suspend => "SUSPEND",
            EntryAction::Abort => "ABORT",
            EntryAction::Restart => "RESTART",
        }
    }

    /// Progressive verb shown while the action is in flight.
    pub fn progress_text(&self) -> &'static str {
        match self {
            EntryAction::Delete => "Deleting",
            EntryAction::Resume => "Resuming",
            EntryAction::Suspend => "Suspending",
            EntryAction::Abort => "Aborting",
            EntryAction::Restart => "Restarting",
        }
    }
}

impl std::fmt::Display for EntryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Returns whether `action` is permitted for `status`.
///
/// An unrecognised status (`None`) has no legal actions: queue data comes from
/// the collaborator and may carry values this client does not know yet.
pub fn is_valid_action(status: Option<EntryStatus>, action: EntryAction) -> bool {
    status.is_some_and(|s| s.allows(action))
}

pub fn legal_actions(status: Option<EntryStatus>) -> &'static [EntryAction] {
    status.map(|s| s.legal_actions()).unwrap_or(&[])
}

pub fn status_text(status: Option<EntryStatus>) -> Option<&'static str> {
    status.map(|s| s.as_str())
}

pub fn action_text(action: Option<EntryAction>) -> Option<&'static str> {
    action.map(|a| a.progress_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_has_no_actions() {
        for action in EntryAction::ALL {
            assert!(!is_valid_action(Some(EntryStatus::Deleted), action));
        }
    }

    #[test]
    fn unknown_status_fails_closed() {
        for action in EntryAction::ALL {
            assert!(!is_valid_action(None, action));
        }
        assert!(legal_actions(None).is_empty());
    }

    #[test]
    fn running_entries_cannot_be_deleted_or_restarted() {
        assert!(!is_valid_action(Some(EntryStatus::Running), EntryAction::Delete));
        assert!(!is_valid_action(Some(EntryStatus::Running), EntryAction::Restart));
        assert!(is_valid_action(Some(EntryStatus::Running), EntryAction::Suspend));
    }

    #[test]
    fn ordinals_follow_wire_order() {
        assert_eq!(EntryStatus::from_ordinal(0), Some(EntryStatus::Queued));
        assert_eq!(EntryStatus::from_ordinal(6), Some(EntryStatus::Deleted));
        assert_eq!(EntryStatus::from_ordinal(7), None);
        assert_eq!(EntryStatus::from_ordinal(-1), None);
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(EntryStatus::from_name("Running"), Some(EntryStatus::Running));
        assert_eq!(EntryAction::from_name("restart"), Some(EntryAction::Restart));
        assert_eq!(EntryAction::from_name("rewind"), None);
    }

    #[test]
    fn display_text_fallbacks() {
        assert_eq!(status_text(Some(EntryStatus::Error)), Some("error"));
        assert_eq!(status_text(None), None);
        assert_eq!(action_text(Some(EntryAction::Abort)), Some("Aborting"));
        assert_eq!(action_text(None), None);
    }

    #[test]
    fn action_serializes_as_wire_name() {
        let json = serde_json::to_string(&EntryAction::Suspend).unwrap();
        assert_eq!(json, r#""SUSPEND""#);
    }
}
