//! Persistence module
//!
//! Live countdown snapshots (a key/value store keyed per timer) and the durable
//! timer list, both reached through the `PersistenceAdapter`.

pub mod adapter;
pub mod clock;
pub mod snapshot;
pub mod timer_list;

use thiserror::Error;

pub use adapter::PersistenceAdapter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use snapshot::{
    snapshot_key, FileSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotStore,
};
pub use timer_list::{FileTimerListStore, MemoryTimerListStore, TimerListStore};

/// Errors from the backing stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store writer has shut down")]
    Closed,
}

pub type StoreResult<T> = Result<T, StoreError>;
