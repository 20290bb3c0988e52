//! Drift reconciliation after the countdown could not tick
//!
//! Runs on mount and whenever the host context becomes visible again. The
//! persisted snapshot tells how much time was left at its `last_update`; the
//! wall-clock difference since then is subtracted to find where the countdown
//! would be now.

use tracing::{debug, info};

use super::{session::CountdownSession, TimeValue};
use crate::persistence::Snapshot;

/// What triggered a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileTrigger {
    Mount,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Ticking never stopped; nothing to catch up on
    AlreadyRunning,
    NoSnapshot,
    /// Snapshot was paused, or the user paused this session
    NotResumable,
    /// Countdown will resume shortly from this remaining time
    Resuming(TimeValue),
    /// Countdown ran out while nobody was ticking
    FinishedInBackground,
}

/// Where a snapshotted countdown stands at a given wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    Remaining(TimeValue),
    Finished { overrun_secs: u64 },
}

pub fn measure_drift(snapshot: &Snapshot, now_ms: i64) -> Drift {
    let elapsed_secs = now_ms.saturating_sub(snapshot.last_update).max(0) / 1000;
    let remaining_secs = i64::try_from(snapshot.time.total_seconds())
        .unwrap_or(i64::MAX)
        .saturating_sub(elapsed_secs);
    if remaining_secs > 0 {
        Drift::Remaining(TimeValue::from_total_seconds(remaining_secs as u64))
    } else {
        Drift::Finished {
            overrun_secs: remaining_secs.unsigned_abs(),
        }
    }
}

pub(crate) fn reconcile(session: &mut CountdownSession, trigger: ReconcileTrigger) -> ReconcileOutcome {
    if session.is_running() {
        return ReconcileOutcome::AlreadyRunning;
    }
    let Some(snapshot) = session.load_snapshot() else {
        return ReconcileOutcome::NoSnapshot;
    };
    if !snapshot.is_running || session.is_paused_by_user() {
        debug!(
            "Not resuming timer {} (snapshot running={}, paused by user={})",
            snapshot.timer_id,
            snapshot.is_running,
            session.is_paused_by_user()
        );
        return ReconcileOutcome::NotResumable;
    }

    match measure_drift(&snapshot, session.persistence().now_ms()) {
        Drift::Remaining(remaining) => {
            let delay = match trigger {
                ReconcileTrigger::Mount => session.options().mount_resume_delay,
                ReconcileTrigger::Visible => session.options().visible_resume_delay,
            };
            info!(
                "Resuming timer {} at {} (snapshot had {})",
                snapshot.timer_id, remaining, snapshot.time
            );
            session.schedule_resume(remaining, delay);
            ReconcileOutcome::Resuming(remaining)
        }
        Drift::Finished { overrun_secs } => {
            info!(
                "Timer {} finished {}s ago while in the background",
                snapshot.timer_id, overrun_secs
            );
            session.finish_in_background(overrun_secs);
            ReconcileOutcome::FinishedInBackground
        }
    }
}

/// Host context went to the background
pub(crate) fn on_hidden(session: &mut CountdownSession) {
    if session.has_pending_resume() {
        // Resume again on the next reconcile, not while hidden
        session.cancel_resume();
    }
    if !session.is_running() {
        return;
    }
    // Baseline for drift measurement when we come back
    session.save_running_snapshot();
    if session.options().suspend_when_hidden {
        session.suspend_ticking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerId;

    fn snapshot(time: TimeValue, last_update: i64) -> Snapshot {
        Snapshot {
            timer_id: TimerId::new("t"),
            time,
            is_running: true,
            last_update,
        }
    }

    #[test]
    fn drift_subtracts_whole_elapsed_seconds() {
        let snap = snapshot(TimeValue::new(0, 0, 10), 10_000);
        assert_eq!(
            measure_drift(&snap, 14_000),
            Drift::Remaining(TimeValue::new(0, 0, 6))
        );
        assert_eq!(
            measure_drift(&snap, 14_999),
            Drift::Remaining(TimeValue::new(0, 0, 6))
        );
    }

    #[test]
    fn drift_past_zero_is_finished_with_overrun() {
        let snap = snapshot(TimeValue::new(0, 0, 10), 0);
        assert_eq!(measure_drift(&snap, 10_000), Drift::Finished { overrun_secs: 0 });
        assert_eq!(measure_drift(&snap, 15_000), Drift::Finished { overrun_secs: 5 });
    }

    #[test]
    fn clock_running_backwards_counts_as_no_elapsed_time() {
        let snap = snapshot(TimeValue::new(0, 1, 0), 50_000);
        assert_eq!(
            measure_drift(&snap, 20_000),
            Drift::Remaining(TimeValue::new(0, 1, 0))
        );
    }

    #[test]
    fn extreme_timestamps_do_not_overflow() {
        let snap = snapshot(TimeValue::new(0, 0, 10), i64::MIN);
        assert!(matches!(
            measure_drift(&snap, i64::MAX),
            Drift::Finished { .. }
        ));

        let snap = snapshot(TimeValue::new(0, 0, 10), i64::MAX);
        assert_eq!(
            measure_drift(&snap, i64::MIN),
            Drift::Remaining(TimeValue::new(0, 0, 10))
        );
    }
}
