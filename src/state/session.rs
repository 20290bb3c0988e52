//! Countdown state machine for the active timer
//!
//! One `CountdownSession` exists per timer shown in the active view. It owns
//! the remaining time and running status, drives the side-effect coordinator
//! on every transition and persists snapshots through the adapter.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{
    reconciler::{self, ReconcileOutcome, ReconcileTrigger},
    TimeValue, Timer, TimerId,
};
use crate::{
    persistence::{PersistenceAdapter, Snapshot, StoreError},
    services::{Capabilities, Navigator, SideEffectCoordinator},
    tasks::scheduler::{Scheduler, TaskHandle, TaskId, TaskKind},
};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Errors surfaced to callers driving sessions
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active timer")]
    NoActiveSession,

    #[error("unknown timer: {0}")]
    UnknownTimer(TimerId),

    #[error("session has shut down")]
    Closed,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Tunables for a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Stop ticking while hidden and rely on reconciliation when visible again
    pub suspend_when_hidden: bool,
    /// Delay before resuming a reconciled countdown on mount
    pub mount_resume_delay: Duration,
    /// Delay before resuming a reconciled countdown when visible again
    pub visible_resume_delay: Duration,
    /// Refresh the in-progress notification when seconds are a multiple of this
    pub notification_refresh_secs: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            suspend_when_hidden: false,
            mount_resume_delay: Duration::from_millis(300),
            visible_resume_delay: Duration::from_millis(100),
            notification_refresh_secs: 5,
        }
    }
}

/// Read-only picture of a session for presentation surfaces
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub timer_id: TimerId,
    pub name: String,
    pub color: Option<String>,
    pub duration: TimeValue,
    pub remaining: TimeValue,
    pub is_running: bool,
    pub is_paused_by_user: bool,
    pub is_audio_playing: bool,
    pub holds_wake_lock: bool,
    pub is_visible: bool,
    /// The timer deleted itself on completion
    pub is_discarded: bool,
    pub completions: u32,
}

/// Collaborators handed to a session at construction
pub struct SessionContext {
    pub persistence: PersistenceAdapter,
    pub scheduler: Arc<dyn Scheduler>,
    pub capabilities: Capabilities,
    pub navigator: Arc<dyn Navigator>,
    pub options: SessionOptions,
}

pub struct CountdownSession {
    timer: Timer,
    remaining: TimeValue,
    is_running: bool,
    paused_by_user: bool,
    visible: bool,
    discarded: bool,
    completions: u32,
    ticker: Option<TaskHandle>,
    pending_resume: Option<TaskHandle>,
    persistence: PersistenceAdapter,
    scheduler: Arc<dyn Scheduler>,
    effects: SideEffectCoordinator,
    navigator: Arc<dyn Navigator>,
    options: SessionOptions,
    view_tx: watch::Sender<SessionView>,
}

impl CountdownSession {
    /// Create a paused session with the full configured duration remaining
    pub fn new(timer: Timer, context: SessionContext) -> Self {
        let view = SessionView {
            timer_id: timer.id.clone(),
            name: timer.name.clone(),
            color: timer.color.clone(),
            duration: timer.time,
            remaining: timer.time,
            is_running: false,
            is_paused_by_user: false,
            is_audio_playing: false,
            holds_wake_lock: false,
            is_visible: true,
            is_discarded: false,
            completions: 0,
        };
        let (view_tx, _) = watch::channel(view);

        Self {
            remaining: timer.time,
            timer,
            is_running: false,
            paused_by_user: false,
            visible: true,
            discarded: false,
            completions: 0,
            ticker: None,
            pending_resume: None,
            persistence: context.persistence,
            scheduler: context.scheduler,
            effects: SideEffectCoordinator::new(context.capabilities),
            navigator: context.navigator,
            options: context.options,
            view_tx,
        }
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn remaining(&self) -> TimeValue {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_paused_by_user(&self) -> bool {
        self.paused_by_user
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    pub fn is_audio_playing(&self) -> bool {
        self.effects.is_audio_playing()
    }

    pub fn holds_wake_lock(&self) -> bool {
        self.effects.holds_wake_lock()
    }

    pub fn has_pending_resume(&self) -> bool {
        self.pending_resume.is_some()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn view(&self) -> SessionView {
        self.view_tx.borrow().clone()
    }

    /// Subscribe a presentation surface to view updates
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    /// First activation: ask for notification permission and pick up any
    /// countdown left running by a previous session
    pub fn mount(&mut self) -> ReconcileOutcome {
        self.effects.ensure_notification_permission();
        let outcome = reconciler::reconcile(self, ReconcileTrigger::Mount);
        info!("Mounted timer {} ({:?})", self.timer.id, outcome);
        self.publish();
        outcome
    }

    pub fn start(&mut self) {
        if self.discarded {
            warn!("Timer {} was deleted, ignoring start", self.timer.id);
            return;
        }
        if self.is_running {
            debug!("Timer {} already running", self.timer.id);
            return;
        }
        if self.remaining.is_zero() {
            self.remaining = self.timer.time;
        }
        if self.remaining.is_zero() {
            warn!("Timer {} has a zero duration, not starting", self.timer.id);
            return;
        }

        info!("Starting timer {} at {}", self.timer.id, self.remaining);
        self.effects.prepare_audio(&self.timer);
        self.begin_running();
        self.effects.show_notification(&self.timer, self.remaining, false);
        self.persistence.save_snapshot(&self.timer.id, self.remaining, true);
        self.publish();
    }

    /// Advance the countdown by one second
    pub fn tick(&mut self) {
        if !self.is_running {
            return;
        }
        match self.remaining.decrement() {
            Some(next) if !next.is_zero() => {
                self.remaining = next;
                self.persistence.save_snapshot(&self.timer.id, next, true);
                if next.seconds % self.options.notification_refresh_secs.max(1) == 0 {
                    self.effects.show_notification(&self.timer, next, false);
                }
                self.publish();
            }
            _ => {
                self.remaining = TimeValue::ZERO;
                self.complete(None);
            }
        }
    }

    /// User-initiated pause
    pub fn pause(&mut self) {
        info!("Pausing timer {} at {}", self.timer.id, self.remaining);
        self.paused_by_user = true;
        self.halt();
        self.persistence.save_snapshot(&self.timer.id, self.remaining, false);
        self.effects.close_notification();
        self.publish();
    }

    pub fn reset(&mut self) {
        info!("Resetting timer {}", self.timer.id);
        self.remaining = self.timer.time;
        self.pause();
        self.persistence.clear_snapshot(&self.timer.id);
    }

    /// Apply an edited timer definition; a new duration restarts from the top
    pub fn update_timer(&mut self, timer: Timer) {
        if timer.id != self.timer.id {
            warn!("Refusing to swap timer {} for {}", self.timer.id, timer.id);
            return;
        }
        let duration_changed = timer.time != self.timer.time;
        if timer.file != self.timer.file {
            self.effects.invalidate_audio();
        }
        self.timer = timer;

        if duration_changed {
            info!("Duration of timer {} changed to {}", self.timer.id, self.timer.time);
            self.remaining = self.timer.time;
            self.pause();
        } else {
            self.publish();
        }
    }

    /// Preview the alarm without touching the countdown
    pub fn toggle_test_playback(&mut self) {
        if self.effects.is_audio_playing() {
            self.effects.stop_alarm();
        } else {
            self.effects.prepare_audio(&self.timer);
            self.effects.play_alarm(&self.timer);
        }
        self.publish();
    }

    pub fn stop_alarm(&mut self) {
        self.effects.stop_alarm();
        self.publish();
    }

    /// Host context moved between foreground and background
    pub fn set_visibility(&mut self, visible: bool) {
        if visible == self.visible {
            return;
        }
        self.visible = visible;
        if visible {
            let outcome = reconciler::reconcile(self, ReconcileTrigger::Visible);
            debug!("Visible again, timer {} {:?}", self.timer.id, outcome);
        } else {
            reconciler::on_hidden(self);
        }
        self.publish();
    }

    /// Route a fired scheduler task; events from cancelled tasks are dropped
    pub fn on_scheduled(&mut self, task: TaskId, kind: TaskKind) {
        match kind {
            TaskKind::Tick => {
                if self.ticker.as_ref().map(TaskHandle::id) == Some(task) {
                    self.tick();
                } else {
                    debug!("Dropping stale tick {:?}", task);
                }
            }
            TaskKind::Resume => {
                if self.pending_resume.as_ref().map(TaskHandle::id) == Some(task) {
                    self.pending_resume = None;
                    self.start();
                } else {
                    debug!("Dropping stale resume {:?}", task);
                }
            }
        }
    }

    /// Tear down: stop ticking, keep a final snapshot if running and release
    /// every platform resource
    pub fn unmount(&mut self) {
        let was_running = self.is_running;
        self.halt();
        if was_running {
            self.persistence.save_snapshot(&self.timer.id, self.remaining, true);
        }
        self.effects.release_all();
        info!("Unmounted timer {}", self.timer.id);
        self.publish();
    }

    pub(crate) fn persistence(&self) -> &PersistenceAdapter {
        &self.persistence
    }

    pub(crate) fn load_snapshot(&self) -> Option<Snapshot> {
        self.persistence.load_snapshot(&self.timer.id)
    }

    pub(crate) fn save_running_snapshot(&self) {
        self.persistence.save_snapshot(&self.timer.id, self.remaining, true);
    }

    /// Set the reconciled remaining time and resume after `delay`
    pub(crate) fn schedule_resume(&mut self, remaining: TimeValue, delay: Duration) {
        self.remaining = remaining;
        self.cancel_pending_resume();
        self.pending_resume = Some(self.scheduler.after(delay, TaskKind::Resume));
        self.publish();
    }

    /// Drop a deferred resume without touching the countdown
    pub(crate) fn cancel_resume(&mut self) {
        debug!("Cancelling pending resume for timer {}", self.timer.id);
        self.cancel_pending_resume();
        self.publish();
    }

    /// Stop ticking because the host went to the background; not a user pause
    pub(crate) fn suspend_ticking(&mut self) {
        debug!("Suspending ticks for hidden timer {}", self.timer.id);
        self.halt();
        self.publish();
    }

    /// The countdown ran out while nothing was ticking
    pub(crate) fn finish_in_background(&mut self, overrun_secs: u64) {
        self.remaining = TimeValue::ZERO;
        self.complete(Some(overrun_secs));
    }

    fn begin_running(&mut self) {
        self.cancel_pending_resume();
        self.is_running = true;
        self.paused_by_user = false;
        self.effects.request_wake_lock();
        if let Some(previous) = self.ticker.take() {
            previous.cancel();
        }
        self.ticker = Some(self.scheduler.every(TICK_PERIOD, TaskKind::Tick));
    }

    fn halt(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.cancel_pending_resume();
        self.is_running = false;
        self.effects.release_wake_lock();
    }

    fn cancel_pending_resume(&mut self) {
        if let Some(resume) = self.pending_resume.take() {
            resume.cancel();
        }
    }

    /// Completion policy, shared by live ticks and background finishes
    fn complete(&mut self, overrun_secs: Option<u64>) {
        info!("Timer {} complete", self.timer.id);
        self.completions += 1;

        self.effects.stop_alarm();
        self.effects.play_alarm(&self.timer);
        self.effects.show_notification(&self.timer, self.timer.time, true);
        self.persistence.clear_snapshot(&self.timer.id);

        let cycle = self.timer.time.total_seconds();
        if self.timer.is_one_time {
            self.halt();
            if let Err(e) = self.persistence.delete_timer(&self.timer.id) {
                error!("Failed to delete one-time timer {}: {}", self.timer.id, e);
            }
            self.discarded = true;
            self.navigator.go_home();
            self.remaining = self.timer.time;
        } else if self.timer.is_interval && cycle > 0 {
            self.remaining = match overrun_secs {
                Some(overrun) => TimeValue::from_total_seconds(cycle - overrun % cycle),
                None => self.timer.time,
            };
            self.effects.show_notification(&self.timer, self.remaining, false);
            self.persistence.save_snapshot(&self.timer.id, self.remaining, true);
            if !self.is_running {
                self.begin_running();
            }
        } else {
            self.halt();
            self.paused_by_user = true;
            self.remaining = match overrun_secs {
                Some(_) => TimeValue::ZERO,
                None => self.timer.time,
            };
        }

        self.publish();
    }

    fn publish(&self) {
        let view = SessionView {
            timer_id: self.timer.id.clone(),
            name: self.timer.name.clone(),
            color: self.timer.color.clone(),
            duration: self.timer.time,
            remaining: self.remaining,
            is_running: self.is_running,
            is_paused_by_user: self.paused_by_user,
            is_audio_playing: self.effects.is_audio_playing(),
            holds_wake_lock: self.effects.holds_wake_lock(),
            is_visible: self.visible,
            is_discarded: self.discarded,
            completions: self.completions,
        };
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
