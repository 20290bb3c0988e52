//! Task scheduling module
//!
//! Cancellable one-shot and repeating tasks, and the per-session task that
//! owns a countdown and applies commands to it in order.

pub mod scheduler;
pub mod session_task;

// Re-export main types
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, TaskId, TaskKind, TokioScheduler};
pub use session_task::{SessionCommand, SessionHandle};
