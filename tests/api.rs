//! Control API tests
//!
//! Drive the router in-process with memory stores and mock platform backends.

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use countdown_widget::{
    api::create_router,
    persistence::{MemorySnapshotStore, MemoryTimerListStore, PersistenceAdapter, SystemClock},
    services::mock::MockPlatform,
    state::{AppState, SessionOptions, TimeValue, Timer},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(timers: Vec<Timer>) -> (Router, Arc<AppState>, MockPlatform) {
    let platform = MockPlatform::new();
    let persistence = PersistenceAdapter::new(
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(MemoryTimerListStore::with_timers(timers)),
        Arc::new(SystemClock),
    );
    let state = Arc::new(AppState::new(
        persistence,
        Arc::new(platform.clone()),
        SessionOptions::default(),
        20554,
        "127.0.0.1".to_string(),
    ));
    (create_router(state.clone()), state, platform)
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let (router, _, _) = app(vec![]);
    let (status, body) = call(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn timer_crud() {
    let (router, _, _) = app(vec![]);

    let (status, created) = call(
        &router,
        Method::POST,
        "/timers",
        Some(json!({
            "name": "Tea",
            "time": { "hours": 0, "minutes": 3, "seconds": 0 },
            "isInterval": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["isInterval"], true);
    assert_eq!(created["volume"], 1.0);

    let (_, list) = call(&router, Method::GET, "/timers", None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, updated) = call(
        &router,
        Method::PUT,
        &format!("/timers/{}", id),
        Some(json!({
            "name": "Green tea",
            "time": { "hours": 0, "minutes": 2, "seconds": 0 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Green tea");

    let (status, _) = call(&router, Method::DELETE, &format!("/timers/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&router, Method::DELETE, &format!("/timers/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_endpoints_need_an_active_timer() {
    let (router, _, _) = app(vec![]);
    let (status, _) = call(&router, Method::POST, "/session/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&router, Method::POST, "/timers/nope/activate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drive_a_session() {
    let (router, state, platform) = app(vec![Timer::new("t", "Tea", TimeValue::new(0, 5, 0))]);

    let (status, body) = call(&router, Method::POST, "/timers/t/activate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["timerId"], "t");
    assert_eq!(body["status"], "paused");

    let (_, body) = call(&router, Method::POST, "/session/toggle", None).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["session"]["holdsWakeLock"], true);
    assert_eq!(platform.wake_lock.held(), 1);

    let (_, body) = call(&router, Method::POST, "/session/visibility", Some(json!({ "visible": false }))).await;
    assert_eq!(body["session"]["isVisible"], false);
    assert_eq!(body["session"]["isRunning"], true);

    let (_, body) = call(&router, Method::POST, "/session/pause", None).await;
    assert_eq!(body["session"]["isPausedByUser"], true);

    let (_, body) = call(&router, Method::POST, "/session/alarm/test", None).await;
    assert_eq!(body["session"]["isAudioPlaying"], true);
    let (_, body) = call(&router, Method::POST, "/session/alarm/stop", None).await;
    assert_eq!(body["session"]["isAudioPlaying"], false);

    let (_, body) = call(&router, Method::POST, "/session/reset", None).await;
    assert_eq!(body["session"]["remaining"]["minutes"], 5);

    let (_, status) = call(&router, Method::GET, "/status", None).await;
    assert_eq!(status["view"]["view"], "timer");
    assert_eq!(status["view"]["timerId"], "t");
    assert_eq!(status["last_action"], "reset");

    let (_, body) = call(&router, Method::POST, "/session/deactivate", None).await;
    assert_eq!(body["session"]["timerId"], "t");
    assert!(state.active_view().await.is_none());
    assert_eq!(platform.wake_lock.held(), 0);

    let (_, status) = call(&router, Method::GET, "/status", None).await;
    assert_eq!(status["view"]["view"], "home");
    assert!(status["session"].is_null());
}

#[tokio::test]
async fn updating_the_active_timer_duration_pauses_it() {
    let (router, _, _) = app(vec![Timer::new("t", "Tea", TimeValue::new(0, 5, 0))]);
    call(&router, Method::POST, "/timers/t/activate", None).await;
    call(&router, Method::POST, "/session/start", None).await;

    let (status, _) = call(
        &router,
        Method::PUT,
        "/timers/t",
        Some(json!({
            "name": "Tea",
            "time": { "hours": 0, "minutes": 1, "seconds": 0 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, status) = call(&router, Method::GET, "/status", None).await;
    assert_eq!(status["session"]["isRunning"], false);
    assert_eq!(status["session"]["remaining"]["minutes"], 1);
}
