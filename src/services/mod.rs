//! Platform side effects module
//!
//! Capability traits for the alarm sound, notifications, the display wake-lock
//! and view navigation, the coordinator that drives them from the countdown,
//! and the desktop and mock backends.

pub mod capabilities;
pub mod coordinator;
pub mod desktop;
pub mod mock;

// Re-export main types
pub use capabilities::*;
pub use coordinator::SideEffectCoordinator;
pub use desktop::{DesktopCapabilities, DesktopConfig};
