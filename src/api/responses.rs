//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{AudioSource, SessionView, TimeValue, Timer, TimerId, ViewState};

/// API response structure for session endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub session: Option<SessionView>,
}

impl ApiResponse {
    pub fn new(message: impl Into<String>, session: Option<SessionView>) -> Self {
        let status = match &session {
            Some(view) if view.is_running => "running",
            Some(view) if view.is_discarded => "discarded",
            Some(_) => "paused",
            None => "idle",
        };
        Self {
            status: status.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            session,
        }
    }
}

/// Status response with the current view and active session
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub view: ViewState,
    pub session: Option<SessionView>,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body of timer create and update requests
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub time: TimeValue,
    #[serde(default)]
    pub file: Option<AudioSource>,
    #[serde(default)]
    pub volume: Option<f32>,
    #[serde(default)]
    pub is_one_time: bool,
    #[serde(default)]
    pub is_interval: bool,
}

impl TimerRequest {
    pub fn into_timer(self, id: TimerId) -> Timer {
        let mut timer = Timer::new(id, self.name, self.time);
        timer.color = self.color;
        if let Some(file) = self.file {
            timer.file = file;
        }
        if let Some(volume) = self.volume {
            timer.volume = volume;
        }
        timer.is_one_time = self.is_one_time;
        timer.is_interval = self.is_interval;
        timer
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}
