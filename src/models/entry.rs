use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::EntryStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdentifierType {
    /// Patient medical record number.
    Mrn,
    /// Patient FHIR id.
    Patid,
    /// DocumentReference FHIR id.
    Docid,
}

impl IdentifierType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "MRN" => Some(IdentifierType::Mrn),
            "PATID" => Some(IdentifierType::Patid),
            "DOCID" => Some(IdentifierType::Docid),
            _ => None,
        }
    }
}

/// One indexing job as seen by this client, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub id: String,
    pub submitted: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    /// Raw elapsed milliseconds.
    pub elapsed_ms: Option<i64>,
    pub elapsed_text: Option<String>,
    pub total: Option<i64>,
    pub processed: Option<i64>,
    pub error_text: Option<String>,
    /// `None` when the collaborator sent a status this client does not know.
    pub status: Option<EntryStatus>,
    pub status_text: Option<&'static str>,
    pub identifier_type: Option<IdentifierType>,
}

impl QueueEntry {
    pub fn is_deleted(&self) -> bool {
        self.status == Some(EntryStatus::Deleted)
    }

    /// Percentage of work units processed, when the total is known and non-zero.
    pub fn progress(&self) -> Option<u8> {
        match (self.processed, self.total) {
            (Some(done), Some(total)) if total > 0 => {
                let percent = i128::from(done.clamp(0, total)) * 100 / i128::from(total);
                Some(percent as u8)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(processed: i64, total: i64) -> QueueEntry {
        QueueEntry {
            id: "x".into(),
            submitted: None,
            completed: None,
            elapsed_ms: None,
            elapsed_text: None,
            total: Some(total),
            processed: Some(processed),
            error_text: None,
            status: Some(EntryStatus::Running),
            status_text: None,
            identifier_type: None,
        }
    }

    #[test]
    fn progress_handles_huge_totals() {
        assert_eq!(counts(i64::MAX, i64::MAX).progress(), Some(100));
        assert_eq!(counts(i64::MAX / 2, i64::MAX).progress(), Some(49));
    }

    #[test]
    fn progress_needs_a_total() {
        assert_eq!(counts(3, 0).progress(), None);
        assert_eq!(counts(-4, 10).progress(), Some(0));
    }
}
