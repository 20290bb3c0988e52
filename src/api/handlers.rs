//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::{error, info, warn};

use crate::{
    state::{AppState, SessionError, Timer, TimerId},
    tasks::SessionCommand,
};
use super::responses::{ApiResponse, HealthResponse, StatusResponse, TimerRequest, VisibilityRequest};

/// Map a session error onto the HTTP status the caller sees
fn status_for(action: &str, e: SessionError) -> StatusCode {
    match e {
        SessionError::NoActiveSession | SessionError::UnknownTimer(_) => {
            warn!("{} rejected: {}", action, e);
            StatusCode::NOT_FOUND
        }
        SessionError::Closed | SessionError::Store(_) => {
            error!("{} failed: {}", action, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn run_command(
    state: &AppState,
    command: SessionCommand,
    action: &str,
    message: &str,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.command(command).await {
        Ok(view) => {
            info!("{} endpoint called for timer {}", action, view.timer_id);
            Ok(Json(ApiResponse::new(message, Some(view))))
        }
        Err(e) => Err(status_for(action, e)),
    }
}

/// Handle GET /timers - List configured timers
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Timer>>, StatusCode> {
    state.list_timers().map(Json).map_err(|e| {
        error!("Failed to list timers: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Handle POST /timers - Create a timer with a generated id
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TimerRequest>,
) -> Result<(StatusCode, Json<Timer>), StatusCode> {
    let timer = request.into_timer(TimerId::generate());
    match state.create_timer(timer) {
        Ok(timer) => Ok((StatusCode::CREATED, Json(timer))),
        Err(e) => {
            error!("Failed to create timer: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle PUT /timers/:id - Replace a timer definition
pub async fn update_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<TimerRequest>,
) -> Result<Json<Timer>, StatusCode> {
    state
        .update_timer(request.into_timer(TimerId::new(id)))
        .await
        .map(Json)
        .map_err(|e| status_for("Update timer", e))
}

/// Handle DELETE /timers/:id - Delete a timer and its snapshot
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .delete_timer(&TimerId::new(id))
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| status_for("Delete timer", e))
}

/// Handle POST /timers/:id/activate - Show a timer and mount its session
pub async fn activate_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, StatusCode> {
    match state.activate(&TimerId::new(id)).await {
        Ok(view) => {
            info!("Timer {} activated", view.timer_id);
            Ok(Json(ApiResponse::new("Timer activated", Some(view))))
        }
        Err(e) => Err(status_for("Activate", e)),
    }
}

/// Handle POST /session/start
pub async fn start_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    run_command(&state, SessionCommand::Start, "Start", "Countdown started").await
}

/// Handle POST /session/pause
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    run_command(&state, SessionCommand::Pause, "Pause", "Countdown paused").await
}

/// Handle POST /session/reset
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    run_command(&state, SessionCommand::Reset, "Reset", "Countdown reset").await
}

/// Handle POST /session/toggle - Start when paused, pause when running
pub async fn toggle_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    run_command(&state, SessionCommand::Toggle, "Toggle", "Countdown toggled").await
}

/// Handle POST /session/alarm/test - Toggle alarm preview
pub async fn test_alarm_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    run_command(&state, SessionCommand::TestAlarm, "Test alarm", "Alarm preview toggled").await
}

/// Handle POST /session/alarm/stop
pub async fn stop_alarm_handler(State(state): State<Arc<AppState>>) -> Result<Json<ApiResponse>, StatusCode> {
    run_command(&state, SessionCommand::StopAlarm, "Stop alarm", "Alarm stopped").await
}

/// Handle POST /session/visibility - Host context shown or hidden
pub async fn visibility_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<ApiResponse>, StatusCode> {
    let message = if request.visible { "Visible" } else { "Hidden" };
    run_command(&state, SessionCommand::Visibility(request.visible), "Visibility", message).await
}

/// Handle POST /session/deactivate - Unmount and go home
pub async fn deactivate_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    let view = state.deactivate().await;
    info!("Deactivate endpoint called");
    Json(ApiResponse::new("Session closed", view))
}

/// Handle GET /status - Return current view and session
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let session = state.active_view().await;
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        view: state.view_state(),
        session,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
