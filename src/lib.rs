//! Countdown Widget - a resumable countdown timer engine
//!
//! Configured timers count down once per second, ring an alarm, show
//! notifications and keep the display awake while running. Progress is
//! snapshotted so a countdown survives being hidden, unmounted or restarted
//! and catches up on the wall-clock time it missed.

pub mod api;
pub mod config;
pub mod persistence;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use state::{AppState, CountdownSession, TimeValue, Timer, TimerId};
pub use utils::signals::shutdown_signal;
