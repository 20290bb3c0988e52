//! Live countdown snapshots and the key/value stores that hold them

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::{StoreError, StoreResult};
use crate::state::{TimeValue, TimerId};

/// Point-in-time record of a countdown, used to rebuild progress after an absence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub timer_id: TimerId,
    pub time: TimeValue,
    pub is_running: bool,
    /// Wall-clock time of the write, epoch milliseconds
    pub last_update: i64,
}

/// Storage key for a timer's snapshot
pub fn snapshot_key(timer_id: &TimerId) -> String {
    format!("timer-state-{}", timer_id)
}

/// String key/value store with synchronous reads.
///
/// Implementations must not block the caller on durable I/O.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: String) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// In-process snapshot store
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug)]
enum WriteOp {
    Put { key: String, value: String },
    Remove { key: String },
    Flush(oneshot::Sender<()>),
}

/// Directory-backed snapshot store.
///
/// Reads are served from memory. Writes update memory immediately and are
/// queued to a background writer task that applies them to disk in order.
#[derive(Debug)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    entries: Mutex<HashMap<String, String>>,
    writer: mpsc::UnboundedSender<WriteOp>,
}

impl FileSnapshotStore {
    /// Open (creating if needed) a snapshot directory and start its writer task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Arc<Self>> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut entries = HashMap::new();
        let mut listing = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = listing.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(key_from_stem)
            else {
                warn!("Skipping snapshot file with undecodable name {}", path.display());
                continue;
            };
            match tokio::fs::read_to_string(&path).await {
                Ok(value) => {
                    entries.insert(key.to_string(), value);
                }
                Err(e) => warn!("Skipping unreadable snapshot file {}: {}", path.display(), e),
            }
        }
        info!("Loaded {} snapshot(s) from {}", entries.len(), dir.display());

        let (writer, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(dir.clone(), rx));

        Ok(Arc::new(Self {
            dir,
            entries: Mutex::new(entries),
            writer,
        }))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Wait until every queued write has reached the disk
    pub async fn flush(&self) -> StoreResult<()> {
        let (tx, rx) = oneshot::channel();
        self.writer
            .send(WriteOp::Flush(tx))
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)
    }

    fn enqueue(&self, op: WriteOp) -> StoreResult<()> {
        self.writer.send(op).map_err(|_| StoreError::Closed)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> StoreResult<()> {
        {
            let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
            entries.insert(key.to_string(), value.clone());
        }
        self.enqueue(WriteOp::Put { key: key.to_string(), value })
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        {
            let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
            entries.remove(key);
        }
        self.enqueue(WriteOp::Remove { key: key.to_string() })
    }
}

/// Percent-encode everything outside `[A-Za-z0-9_-]` so any key maps to a
/// flat file name and back
fn file_name_for(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 5);
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            name.push(byte as char);
        } else {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name.push_str(".json");
    name
}

fn key_from_stem(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let hex = tail.get(..2)?;
            let hex = std::str::from_utf8(hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

async fn write_loop(dir: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    debug!("Snapshot writer started for {}", dir.display());

    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Put { key, value } => {
                let path = dir.join(file_name_for(&key));
                let tmp = path.with_extension("json.tmp");
                let result = async {
                    tokio::fs::write(&tmp, value.as_bytes()).await?;
                    tokio::fs::rename(&tmp, &path).await
                }
                .await;
                if let Err(e) = result {
                    error!("Failed to write snapshot {}: {}", key, e);
                }
            }
            WriteOp::Remove { key } => {
                let path = dir.join(file_name_for(&key));
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => error!("Failed to remove snapshot {}: {}", key, e),
                }
            }
            WriteOp::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    debug!("Snapshot writer stopped for {}", dir.display());
}
