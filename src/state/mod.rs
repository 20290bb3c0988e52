//! State management module
//!
//! Time values, the timer entity, the countdown state machine with its
//! reconciler, the view router and the application state tying them together.

pub mod app_state;
pub mod reconciler;
pub mod session;
pub mod time_value;
pub mod timer;
pub mod view;

// Re-export main types
pub use app_state::AppState;
pub use reconciler::{ReconcileOutcome, ReconcileTrigger};
pub use session::{CountdownSession, SessionContext, SessionError, SessionOptions, SessionView};
pub use time_value::TimeValue;
pub use timer::{AudioSource, Timer, TimerId};
pub use view::{View, ViewRouter, ViewState};
