//! Countdown Widget - host daemon
//!
//! Serves the control API for the timer list and the active countdown.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use countdown_widget::{
    api::create_router,
    config::Config,
    persistence::{FileSnapshotStore, FileTimerListStore, PersistenceAdapter, SystemClock},
    services::DesktopCapabilities,
    state::AppState,
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_widget={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-widget v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, data_dir={}",
        config.host,
        config.port,
        config.data_dir.display()
    );

    tokio::fs::create_dir_all(&config.data_dir).await?;
    let snapshots = FileSnapshotStore::open(config.snapshot_dir()).await?;
    let persistence = PersistenceAdapter::new(
        snapshots.clone(),
        Arc::new(FileTimerListStore::new(config.timers_path())),
        Arc::new(SystemClock),
    );
    info!("{} timers configured", persistence.list_timers()?.len());

    let capabilities = DesktopCapabilities::probe(&config.desktop_config()).await;

    let state = Arc::new(AppState::new(
        persistence,
        Arc::new(capabilities),
        config.session_options(),
        config.port,
        config.host.clone(),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /timers               - List timers");
    info!("  POST   /timers               - Create a timer");
    info!("  PUT    /timers/:id           - Update a timer");
    info!("  DELETE /timers/:id           - Delete a timer");
    info!("  POST   /timers/:id/activate  - Show a timer");
    info!("  POST   /session/start|pause|reset|toggle");
    info!("  POST   /session/alarm/test|stop");
    info!("  POST   /session/visibility   - {{\"visible\": bool}}");
    info!("  POST   /session/deactivate   - Back to the timer list");
    info!("  GET    /status               - Current view and countdown");
    info!("  GET    /health               - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    state.shutdown().await;
    if let Err(e) = snapshots.flush().await {
        tracing::error!("Failed to flush snapshots: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
