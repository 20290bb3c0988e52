//! Persistence adapter used by the countdown session

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{snapshot_key, Clock, Snapshot, SnapshotStore, StoreResult, TimerListStore};
use crate::state::{TimeValue, Timer, TimerId};

/// Key-based access to countdown snapshots and the durable timer list
#[derive(Clone)]
pub struct PersistenceAdapter {
    snapshots: Arc<dyn SnapshotStore>,
    timers: Arc<dyn TimerListStore>,
    clock: Arc<dyn Clock>,
}

impl PersistenceAdapter {
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        timers: Arc<dyn TimerListStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { snapshots, timers, clock }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Overwrite the snapshot for `timer_id`, stamped with the current time.
    ///
    /// Failures are logged; losing a live-progress snapshot is not fatal.
    pub fn save_snapshot(&self, timer_id: &TimerId, time: TimeValue, is_running: bool) {
        let snapshot = Snapshot {
            timer_id: timer_id.clone(),
            time,
            is_running,
            last_update: self.clock.now_ms(),
        };
        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to encode snapshot for {}: {}", timer_id, e);
                return;
            }
        };
        if let Err(e) = self.snapshots.set(&snapshot_key(timer_id), json) {
            warn!("Failed to save snapshot for {}: {}", timer_id, e);
        }
    }

    /// Load the snapshot for `timer_id`; unreadable entries count as absent
    pub fn load_snapshot(&self, timer_id: &TimerId) -> Option<Snapshot> {
        let raw = match self.snapshots.get(&snapshot_key(timer_id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read snapshot for {}: {}", timer_id, e);
                return None;
            }
        };
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Ignoring corrupt snapshot for {}: {}", timer_id, e);
                None
            }
        }
    }

    pub fn clear_snapshot(&self, timer_id: &TimerId) {
        if let Err(e) = self.snapshots.remove(&snapshot_key(timer_id)) {
            warn!("Failed to clear snapshot for {}: {}", timer_id, e);
        }
    }

    /// All configured timers; an absent list is empty
    pub fn list_timers(&self) -> StoreResult<Vec<Timer>> {
        Ok(self.timers.load_all()?.unwrap_or_default())
    }

    pub fn find_timer(&self, timer_id: &TimerId) -> StoreResult<Option<Timer>> {
        Ok(self
            .list_timers()?
            .into_iter()
            .find(|timer| &timer.id == timer_id))
    }

    /// Create a timer, or replace the one with the same id in place
    pub fn upsert_timer(&self, timer: Timer) -> StoreResult<()> {
        let mut timers = self.list_timers()?;
        match timers.iter_mut().find(|existing| existing.id == timer.id) {
            Some(existing) => *existing = timer,
            None => timers.push(timer),
        }
        self.timers.save_all(&timers)
    }

    /// Remove a timer from the durable list and drop its snapshot.
    ///
    /// Returns whether the timer was present. An absent list is treated as
    /// already deleted.
    pub fn delete_timer(&self, timer_id: &TimerId) -> StoreResult<bool> {
        self.clear_snapshot(timer_id);

        let Some(timers) = self.timers.load_all()? else {
            debug!("Timer list absent, nothing to delete for {}", timer_id);
            return Ok(false);
        };
        let before = timers.len();
        let remaining: Vec<Timer> = timers.into_iter().filter(|t| &t.id != timer_id).collect();
        if remaining.len() == before {
            return Ok(false);
        }
        self.timers.save_all(&remaining)?;
        info!("Deleted timer {}", timer_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{ManualClock, MemorySnapshotStore, MemoryTimerListStore};

    fn adapter_with(timers: MemoryTimerListStore) -> (PersistenceAdapter, Arc<MemorySnapshotStore>) {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let adapter = PersistenceAdapter::new(
            snapshots.clone(),
            Arc::new(timers),
            Arc::new(ManualClock::new(5_000)),
        );
        (adapter, snapshots)
    }

    #[test]
    fn save_then_load_stamps_clock() {
        let (adapter, _) = adapter_with(MemoryTimerListStore::new());
        let id = TimerId::new("t1");
        adapter.save_snapshot(&id, TimeValue::new(0, 1, 0), true);

        let snapshot = adapter.load_snapshot(&id).unwrap();
        assert_eq!(snapshot.time, TimeValue::new(0, 1, 0));
        assert!(snapshot.is_running);
        assert_eq!(snapshot.last_update, 5_000);
    }

    #[test]
    fn corrupt_snapshot_is_absent() {
        let (adapter, snapshots) = adapter_with(MemoryTimerListStore::new());
        let id = TimerId::new("t1");
        snapshots.set(&snapshot_key(&id), "{broken".to_string()).unwrap();
        assert!(adapter.load_snapshot(&id).is_none());
    }

    #[test]
    fn delete_with_absent_list_is_noop() {
        let (adapter, _) = adapter_with(MemoryTimerListStore::new());
        assert!(!adapter.delete_timer(&TimerId::new("gone")).unwrap());
    }

    #[test]
    fn delete_removes_timer_and_snapshot() {
        let timers = MemoryTimerListStore::with_timers(vec![
            Timer::new("a", "A", TimeValue::new(0, 0, 5)),
            Timer::new("b", "B", TimeValue::new(0, 0, 6)),
        ]);
        let (adapter, snapshots) = adapter_with(timers);
        let id = TimerId::new("a");
        adapter.save_snapshot(&id, TimeValue::new(0, 0, 3), true);

        assert!(adapter.delete_timer(&id).unwrap());
        let remaining = adapter.list_timers().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.as_str(), "b");
        assert!(snapshots.is_empty());
    }

    #[test]
    fn upsert_replaces_in_place() {
        let timers = MemoryTimerListStore::with_timers(vec![
            Timer::new("a", "A", TimeValue::new(0, 0, 5)),
            Timer::new("b", "B", TimeValue::new(0, 0, 6)),
        ]);
        let (adapter, _) = adapter_with(timers);
        adapter
            .upsert_timer(Timer::new("a", "Renamed", TimeValue::new(0, 0, 9)))
            .unwrap();
        adapter
            .upsert_timer(Timer::new("c", "C", TimeValue::new(0, 0, 1)))
            .unwrap();

        let names: Vec<String> = adapter.list_timers().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Renamed", "B", "C"]);
    }
}
