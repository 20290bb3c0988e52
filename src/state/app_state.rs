//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{SessionError, SessionOptions, SessionView, Timer, TimerId, ViewRouter, ViewState};
use crate::{
    persistence::{PersistenceAdapter, StoreResult},
    services::{CapabilityProvider, Navigator},
    tasks::{SessionCommand, SessionHandle},
};

/// Application state: the timer list, the single active session and the view
pub struct AppState {
    pub persistence: PersistenceAdapter,
    capabilities: Arc<dyn CapabilityProvider>,
    pub options: SessionOptions,
    /// Which view the presentation surface shows
    pub router: Arc<ViewRouter>,
    /// At most one mounted session at a time
    active: tokio::sync::Mutex<Option<SessionHandle>>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(
        persistence: PersistenceAdapter,
        capabilities: Arc<dyn CapabilityProvider>,
        options: SessionOptions,
        port: u16,
        host: String,
    ) -> Self {
        Self {
            persistence,
            capabilities,
            options,
            router: Arc::new(ViewRouter::new()),
            active: tokio::sync::Mutex::new(None),
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Make `timer_id` the active view, mounting a fresh session for it.
    ///
    /// Activating the timer that is already active only brings it to the front.
    pub async fn activate(&self, timer_id: &TimerId) -> Result<SessionView, SessionError> {
        let timer = self
            .persistence
            .find_timer(timer_id)?
            .ok_or_else(|| SessionError::UnknownTimer(timer_id.clone()))?;

        let mut active = self.active.lock().await;
        if let Some(handle) = active.as_ref() {
            if handle.timer_id() == timer_id && !handle.is_closed() {
                self.router.open_timer(timer_id);
                return Ok(handle.view());
            }
        }
        if let Some(previous) = active.take() {
            info!("Switching away from timer {}", previous.timer_id());
            previous.unmount().await;
        }

        let navigator: Arc<dyn Navigator> = self.router.clone();
        let handle = SessionHandle::spawn(
            timer,
            self.persistence.clone(),
            self.capabilities.capabilities(navigator.clone()),
            navigator,
            self.options.clone(),
        );
        let view = handle.view();
        *active = Some(handle);
        drop(active);

        // A one-time timer that ran out while unmounted has already gone home
        if view.is_discarded {
            info!("Timer {} finished while unmounted and was removed", timer_id);
        } else {
            self.router.open_timer(timer_id);
        }
        self.record_action(&format!("activate {}", timer_id));
        Ok(view)
    }

    /// Unmount the active session, if any, and go back home
    pub async fn deactivate(&self) -> Option<SessionView> {
        let previous = self.active.lock().await.take();
        let view = match previous {
            Some(handle) => Some(handle.unmount().await),
            None => None,
        };
        self.router.go_home();
        self.record_action("deactivate");
        view
    }

    /// Apply a command to the active session and return its resulting view
    pub async fn command(&self, command: SessionCommand) -> Result<SessionView, SessionError> {
        let action = command_name(&command);
        let mut active = self.active.lock().await;
        let handle = match active.as_ref() {
            Some(handle) if !handle.is_closed() => handle,
            Some(_) => {
                // One-time timer finished and removed itself
                *active = None;
                return Err(SessionError::NoActiveSession);
            }
            None => return Err(SessionError::NoActiveSession),
        };

        match handle.request(command).await {
            Ok(view) => {
                drop(active);
                self.record_action(action);
                Ok(view)
            }
            Err(SessionError::Closed) => {
                // The command itself ended the session; report its final view
                let view = handle.view();
                *active = None;
                drop(active);
                self.record_action(action);
                Ok(view)
            }
            Err(e) => Err(e),
        }
    }

    /// View of the active session, dropping it if it has ended on its own
    pub async fn active_view(&self) -> Option<SessionView> {
        let mut active = self.active.lock().await;
        match active.as_ref() {
            Some(handle) if handle.is_closed() => {
                *active = None;
                None
            }
            Some(handle) => Some(handle.view()),
            None => None,
        }
    }

    pub fn view_state(&self) -> ViewState {
        self.router.current()
    }

    pub fn list_timers(&self) -> StoreResult<Vec<Timer>> {
        self.persistence.list_timers()
    }

    pub fn create_timer(&self, timer: Timer) -> StoreResult<Timer> {
        info!("Creating timer {} ({})", timer.id, timer.name);
        self.persistence.upsert_timer(timer.clone())?;
        self.record_action(&format!("create {}", timer.id));
        Ok(timer)
    }

    /// Store an edited timer and hand it to the active session if it is the one
    pub async fn update_timer(&self, timer: Timer) -> Result<Timer, SessionError> {
        if self.persistence.find_timer(&timer.id)?.is_none() {
            return Err(SessionError::UnknownTimer(timer.id));
        }
        self.persistence.upsert_timer(timer.clone())?;

        let active = self.active.lock().await;
        if let Some(handle) = active.as_ref().filter(|h| h.timer_id() == &timer.id) {
            if let Err(e) = handle.request(SessionCommand::UpdateTimer(timer.clone())).await {
                warn!("Active session for {} did not take the update: {}", timer.id, e);
            }
        }
        drop(active);

        self.record_action(&format!("update {}", timer.id));
        Ok(timer)
    }

    /// Delete a timer and its snapshot; an active session for it is unmounted first
    pub async fn delete_timer(&self, timer_id: &TimerId) -> Result<(), SessionError> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|h| h.timer_id() == timer_id) {
            if let Some(handle) = active.take() {
                handle.unmount().await;
            }
            self.router.go_home();
        }
        drop(active);

        if !self.persistence.delete_timer(timer_id)? {
            return Err(SessionError::UnknownTimer(timer_id.clone()));
        }
        self.record_action(&format!("delete {}", timer_id));
        Ok(())
    }

    /// Unmount the active session so a running countdown keeps its snapshot
    pub async fn shutdown(&self) {
        if let Some(handle) = self.active.lock().await.take() {
            info!("Unmounting timer {} for shutdown", handle.timer_id());
            handle.unmount().await;
        }
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}

fn command_name(command: &SessionCommand) -> &'static str {
    match command {
        SessionCommand::Start => "start",
        SessionCommand::Pause => "pause",
        SessionCommand::Reset => "reset",
        SessionCommand::Toggle => "toggle",
        SessionCommand::TestAlarm => "alarm-test",
        SessionCommand::StopAlarm => "alarm-stop",
        SessionCommand::Visibility(true) => "visible",
        SessionCommand::Visibility(false) => "hidden",
        SessionCommand::UpdateTimer(_) => "update",
        SessionCommand::Scheduled { .. } => "scheduled",
        SessionCommand::Query(_) => "query",
        SessionCommand::Unmount(_) => "unmount",
    }
}
