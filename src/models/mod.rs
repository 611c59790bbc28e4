pub mod entry;
pub mod status;

pub use entry::{IdentifierType, QueueEntry};
pub use status::{action_text, is_valid_action, legal_actions, status_text, EntryAction, EntryStatus};
