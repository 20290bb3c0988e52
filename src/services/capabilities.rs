//! Platform capability model
//!
//! Every platform effect sits behind a trait and is wrapped in `Capability` so
//! callers branch on presence instead of on backend failures.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::state::{AudioSource, TimerId};

/// Failure of a best-effort platform effect
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("capability not supported on this platform")]
    Unsupported,

    #[error("permission denied")]
    PermissionDenied,

    #[error("no tokio runtime available")]
    NoRuntime,

    #[error("{0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EffectResult<T> = Result<T, EffectError>;

/// A platform backend that may be missing
pub enum Capability<T> {
    Supported(T),
    Unsupported,
}

impl<T> Capability<T> {
    pub fn is_supported(&self) -> bool {
        matches!(self, Capability::Supported(_))
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        match self {
            Capability::Supported(backend) => Some(backend),
            Capability::Unsupported => None,
        }
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Capability::Supported(backend) => Some(backend),
            Capability::Unsupported => None,
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(backend: Option<T>) -> Self {
        match backend {
            Some(backend) => Capability::Supported(backend),
            None => Capability::Unsupported,
        }
    }
}

/// Alarm sound playback
pub trait AudioBackend: Send {
    /// Resolve the source into something playable
    fn load(&mut self, timer_id: &TimerId, source: &AudioSource) -> EffectResult<()>;

    /// Begin playback from the current position
    fn play(&mut self, looping: bool, volume: f32) -> EffectResult<()>;

    /// Pause and rewind to the start
    fn stop(&mut self) -> EffectResult<()>;
}

/// Notification permission, browser style
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPermission {
    Default,
    Granted,
    Denied,
}

/// Opaque id of a displayed notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub timer_id: TimerId,
    /// Platform grouping tag; equal tags replace instead of stacking
    pub tag: String,
    pub title: String,
    pub body: String,
    pub require_interaction: bool,
    pub silent: bool,
}

pub trait NotificationBackend: Send {
    fn permission(&self) -> NotificationPermission;
    fn request_permission(&mut self) -> NotificationPermission;
    fn show(&mut self, request: NotificationRequest) -> EffectResult<NotificationHandle>;
    fn close(&mut self, handle: NotificationHandle) -> EffectResult<()>;
}

/// Held display wake-lock; dropping it releases the lock
pub struct WakeLockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl WakeLockGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self { release: Some(Box::new(release)) }
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for WakeLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeLockGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

pub trait WakeLockBackend: Send {
    fn acquire(&mut self) -> EffectResult<WakeLockGuard>;
}

/// Moves the presentation surface between views
pub trait Navigator: Send + Sync {
    /// Bring the application to the foreground
    fn focus(&self);
    fn open_timer(&self, timer_id: &TimerId);
    fn go_home(&self);
}

/// What clicking any timer notification does
pub fn handle_notification_click(navigator: &dyn Navigator, timer_id: &TimerId) {
    debug!("Notification clicked for timer {}", timer_id);
    navigator.focus();
    navigator.open_timer(timer_id);
}

/// The platform backends handed to one session
pub struct Capabilities {
    pub audio: Capability<Box<dyn AudioBackend>>,
    pub notifications: Capability<Box<dyn NotificationBackend>>,
    pub wake_lock: Capability<Box<dyn WakeLockBackend>>,
}

impl Capabilities {
    /// No platform support at all
    pub fn none() -> Self {
        Self {
            audio: Capability::Unsupported,
            notifications: Capability::Unsupported,
            wake_lock: Capability::Unsupported,
        }
    }
}

/// Builds a fresh set of backends for each mounted session
pub trait CapabilityProvider: Send + Sync {
    fn capabilities(&self, navigator: Arc<dyn Navigator>) -> Capabilities;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn guard_releases_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let guard = WakeLockGuard::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        guard.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capability_from_option() {
        let mut supported: Capability<u8> = Some(3).into();
        assert!(supported.is_supported());
        assert_eq!(supported.as_mut().copied(), Some(3));
        let unsupported: Capability<u8> = None.into();
        assert!(!unsupported.is_supported());
    }
}
