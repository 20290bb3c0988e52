//! Durable list of configured timers

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::debug;

use super::{StoreError, StoreResult};
use crate::state::Timer;

/// Ordered collection of configured timers.
///
/// `load_all` returns `None` when the list has never been written.
pub trait TimerListStore: Send + Sync {
    fn load_all(&self) -> StoreResult<Option<Vec<Timer>>>;
    fn save_all(&self, timers: &[Timer]) -> StoreResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTimerListStore {
    timers: Mutex<Option<Vec<Timer>>>,
}

impl MemoryTimerListStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timers(timers: Vec<Timer>) -> Self {
        Self { timers: Mutex::new(Some(timers)) }
    }
}

impl TimerListStore for MemoryTimerListStore {
    fn load_all(&self) -> StoreResult<Option<Vec<Timer>>> {
        let timers = self.timers.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(timers.clone())
    }

    fn save_all(&self, timers: &[Timer]) -> StoreResult<()> {
        let mut stored = self.timers.lock().map_err(|_| StoreError::Poisoned)?;
        *stored = Some(timers.to_vec());
        Ok(())
    }
}

/// Timer list kept as a single JSON document
#[derive(Debug)]
pub struct FileTimerListStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTimerListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TimerListStore for FileTimerListStore {
    fn load_all(&self) -> StoreResult<Option<Vec<Timer>>> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let timers: Vec<Timer> = serde_json::from_str(&raw)?;
        Ok(Some(timers))
    }

    fn save_all(&self, timers: &[Timer]) -> StoreResult<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(timers)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved {} timer(s) to {}", timers.len(), self.path.display());
        Ok(())
    }
}
