//! HTTP API module
//!
//! Control surface for the timer list and the active countdown session.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", get(list_timers_handler).post(create_timer_handler))
        .route("/timers/:id", put(update_timer_handler).delete(delete_timer_handler))
        .route("/timers/:id/activate", post(activate_handler))
        .route("/session/start", post(start_handler))
        .route("/session/pause", post(pause_handler))
        .route("/session/reset", post(reset_handler))
        .route("/session/toggle", post(toggle_handler))
        .route("/session/alarm/test", post(test_alarm_handler))
        .route("/session/alarm/stop", post(stop_alarm_handler))
        .route("/session/visibility", post(visibility_handler))
        .route("/session/deactivate", post(deactivate_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
