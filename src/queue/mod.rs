pub mod auto_refresh;
pub mod filter;
pub mod normalize;
pub mod sync;

pub use auto_refresh::{AutoRefresh, RefreshFn, RefreshHandle};
pub use filter::StatusFilter;
pub use normalize::{format_elapsed, normalize_entry};
pub use sync::{MergeOutcome, QueueSnapshot, QueueState, QueueSynchronizer};

pub use crate::config::clamp_refresh as clamp_interval;
