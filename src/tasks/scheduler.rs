//! Cancellable repeating and deferred tasks driving a session

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::{
    sync::mpsc,
    time::{interval_at, sleep, Instant, MissedTickBehavior},
};
use tracing::debug;

use super::session_task::SessionCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// What a scheduled task delivers when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// One-second countdown tick
    Tick,
    /// Deferred resume after reconciliation
    Resume,
}

/// Handle to a scheduled task. Cancels the task when cancelled or dropped.
pub struct TaskHandle {
    id: TaskId,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TaskHandle {
    pub fn new(id: TaskId, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

pub trait Scheduler: Send + Sync {
    /// Fire `kind` every `period`, first after one period
    fn every(&self, period: Duration, kind: TaskKind) -> TaskHandle;

    /// Fire `kind` once after `delay`
    fn after(&self, delay: Duration, kind: TaskKind) -> TaskHandle;
}

/// Scheduler posting fired tasks into a session task's command channel
pub struct TokioScheduler {
    commands: mpsc::WeakUnboundedSender<SessionCommand>,
    next_id: AtomicU64,
}

impl TokioScheduler {
    pub fn new(commands: &mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self {
            commands: commands.downgrade(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn post(commands: &mpsc::WeakUnboundedSender<SessionCommand>, task: TaskId, kind: TaskKind) -> bool {
        match commands.upgrade() {
            Some(tx) => tx.send(SessionCommand::Scheduled { task, kind }).is_ok(),
            None => false,
        }
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, kind: TaskKind) -> TaskHandle {
        let id = self.next_id();
        let commands = self.commands.clone();
        let join = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if !Self::post(&commands, id, kind) {
                    debug!("Session gone, stopping task {:?}", id);
                    break;
                }
            }
        });
        TaskHandle::new(id, move || join.abort())
    }

    fn after(&self, delay: Duration, kind: TaskKind) -> TaskHandle {
        let id = self.next_id();
        let commands = self.commands.clone();
        let join = tokio::spawn(async move {
            sleep(delay).await;
            Self::post(&commands, id, kind);
        });
        TaskHandle::new(id, move || join.abort())
    }
}

/// A task recorded by `ManualScheduler`
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub delay: Duration,
    pub repeating: bool,
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler that never fires on its own; tests inspect and fire tasks by hand
#[derive(Debug, Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<ScheduledTask>>,
    next_id: AtomicU64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, kind: TaskKind, delay: Duration, repeating: bool) -> TaskHandle {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let cancelled = Arc::new(AtomicBool::new(false));
        self.tasks.lock().unwrap().push(ScheduledTask {
            id,
            kind,
            delay,
            repeating,
            cancelled: cancelled.clone(),
        });
        TaskHandle::new(id, move || cancelled.store(true, Ordering::SeqCst))
    }

    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().unwrap().clone()
    }

    /// Tasks of `kind` that are still live
    pub fn active(&self, kind: TaskKind) -> Vec<ScheduledTask> {
        self.tasks()
            .into_iter()
            .filter(|task| task.kind == kind && !task.is_cancelled())
            .collect()
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, kind: TaskKind) -> TaskHandle {
        self.record(kind, period, true)
    }

    fn after(&self, delay: Duration, kind: TaskKind) -> TaskHandle {
        self.record(kind, delay, false)
    }
}
