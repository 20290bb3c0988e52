//! Session task: the single timeline a countdown session runs on

use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::scheduler::{TaskId, TaskKind, TokioScheduler};
use crate::{
    persistence::PersistenceAdapter,
    services::{Capabilities, Navigator},
    state::{CountdownSession, SessionContext, SessionError, SessionOptions, SessionView, Timer, TimerId},
};

/// Everything a session task can be asked to do
#[derive(Debug)]
pub enum SessionCommand {
    Start,
    Pause,
    Reset,
    /// Start when paused, pause when running
    Toggle,
    TestAlarm,
    StopAlarm,
    Visibility(bool),
    UpdateTimer(Timer),
    /// A scheduler task fired
    Scheduled { task: TaskId, kind: TaskKind },
    /// Reply with the view once every earlier command has been applied
    Query(oneshot::Sender<SessionView>),
    Unmount(oneshot::Sender<()>),
}

/// Owner-side handle of a running session task
pub struct SessionHandle {
    timer_id: TimerId,
    tx: mpsc::UnboundedSender<SessionCommand>,
    view_rx: watch::Receiver<SessionView>,
    join: JoinHandle<()>,
}

impl SessionHandle {
    /// Mount a session for `timer` and run it on its own task
    pub fn spawn(
        timer: Timer,
        persistence: PersistenceAdapter,
        capabilities: Capabilities,
        navigator: Arc<dyn Navigator>,
        options: SessionOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let timer_id = timer.id.clone();
        let mut session = CountdownSession::new(
            timer,
            SessionContext {
                persistence,
                scheduler: Arc::new(TokioScheduler::new(&tx)),
                capabilities,
                navigator,
                options,
            },
        );
        session.mount();
        let view_rx = session.subscribe();
        let join = tokio::spawn(session_task(session, rx));

        Self { timer_id, tx, view_rx, join }
    }

    pub fn timer_id(&self) -> &TimerId {
        &self.timer_id
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    /// The task has ended (unmounted or self-deleted)
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(command).map_err(|_| SessionError::Closed)
    }

    /// Send a command and wait for the view after it was applied
    pub async fn request(&self, command: SessionCommand) -> Result<SessionView, SessionError> {
        self.send(command)?;
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Query(reply))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Unmount the session and wait for its task to finish
    pub async fn unmount(self) -> SessionView {
        let (ack, rx) = oneshot::channel();
        if self.tx.send(SessionCommand::Unmount(ack)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = self.join.await {
            warn!("Session task for {} ended abnormally: {}", self.timer_id, e);
        }
        self.view_rx.borrow().clone()
    }
}

/// Process commands for one session until unmounted.
///
/// A one-time timer that deleted itself ends its task once the alarm stops.
async fn session_task(mut session: CountdownSession, mut rx: mpsc::UnboundedReceiver<SessionCommand>) {
    let timer_id = session.timer().id.clone();
    info!("Session task started for timer {}", timer_id);

    let mut unmount_ack = None;
    loop {
        if session.is_discarded() && !session.is_audio_playing() {
            info!("Timer {} deleted itself, ending session", timer_id);
            break;
        }

        let Some(command) = rx.recv().await else {
            debug!("All handles for timer {} dropped", timer_id);
            break;
        };

        match command {
            SessionCommand::Start => session.start(),
            SessionCommand::Pause => session.pause(),
            SessionCommand::Reset => session.reset(),
            SessionCommand::Toggle => {
                if session.is_running() {
                    session.pause();
                } else {
                    session.start();
                }
            }
            SessionCommand::TestAlarm => session.toggle_test_playback(),
            SessionCommand::StopAlarm => session.stop_alarm(),
            SessionCommand::Visibility(visible) => session.set_visibility(visible),
            SessionCommand::UpdateTimer(timer) => session.update_timer(timer),
            SessionCommand::Scheduled { task, kind } => session.on_scheduled(task, kind),
            SessionCommand::Query(reply) => {
                let _ = reply.send(session.view());
            }
            SessionCommand::Unmount(ack) => {
                unmount_ack = Some(ack);
                break;
            }
        }
    }

    session.unmount();
    rx.close();
    if let Some(ack) = unmount_ack {
        let _ = ack.send(());
    }
    info!("Session task stopped for timer {}", timer_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persistence::{ManualClock, MemorySnapshotStore, MemoryTimerListStore},
        services::mock::MockPlatform,
        state::TimeValue,
    };
    use std::time::Duration;

    fn spawn(timer: Timer, platform: &MockPlatform) -> (SessionHandle, PersistenceAdapter) {
        let persistence = PersistenceAdapter::new(
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(MemoryTimerListStore::with_timers(vec![timer.clone()])),
            Arc::new(ManualClock::new(0)),
        );
        let handle = SessionHandle::spawn(
            timer,
            persistence.clone(),
            platform.backends(),
            platform.navigator.clone(),
            SessionOptions::default(),
        );
        (handle, persistence)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_arrive_once_per_second() {
        let platform = MockPlatform::new();
        let (handle, _) = spawn(Timer::new("t", "T", TimeValue::new(0, 0, 10)), &platform);

        let view = handle.request(SessionCommand::Start).await.unwrap();
        assert!(view.is_running);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let view = handle.request(SessionCommand::Pause).await.unwrap();
        assert_eq!(view.remaining, TimeValue::new(0, 0, 7));
        assert!(!view.is_running);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let (reply, rx) = oneshot::channel();
        handle.send(SessionCommand::Query(reply)).unwrap();
        assert_eq!(rx.await.unwrap().remaining, TimeValue::new(0, 0, 7));
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_persists_running_snapshot() {
        let platform = MockPlatform::new();
        let (handle, persistence) = spawn(Timer::new("t", "T", TimeValue::new(0, 1, 0)), &platform);

        handle.request(SessionCommand::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let view = handle.unmount().await;

        assert!(!view.is_running);
        assert_eq!(platform.wake_lock.held(), 0);
        let snapshot = persistence.load_snapshot(&TimerId::new("t")).unwrap();
        assert!(snapshot.is_running);
        assert_eq!(snapshot.time, TimeValue::new(0, 0, 58));
    }

    #[tokio::test(start_paused = true)]
    async fn one_time_session_ends_after_alarm_stops() {
        let platform = MockPlatform::new();
        let timer = Timer::new("once", "Once", TimeValue::new(0, 0, 2)).one_time();
        let (handle, persistence) = spawn(timer, &platform);

        handle.request(SessionCommand::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let view = handle.request(SessionCommand::TestAlarm).await;
        // TestAlarm toggles the ringing alarm off, which ends the task
        assert!(view.is_err() || !view.unwrap().is_audio_playing);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_closed());
        assert!(persistence.list_timers().unwrap().is_empty());
    }
}
