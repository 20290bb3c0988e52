//! Side-effect coordinator: alarm sound, notification, wake-lock
//!
//! All operations are best-effort. A failure is logged and the effect is
//! skipped; nothing here returns an error to the state machine.

use tracing::{debug, info, warn};

use super::capabilities::{
    AudioBackend, Capabilities, Capability, NotificationBackend, NotificationHandle,
    NotificationPermission, NotificationRequest, WakeLockBackend, WakeLockGuard,
};
use crate::state::{TimeValue, Timer};

pub struct SideEffectCoordinator {
    audio: Capability<Box<dyn AudioBackend>>,
    notifications: Capability<Box<dyn NotificationBackend>>,
    wake_lock: Capability<Box<dyn WakeLockBackend>>,
    audio_loaded: bool,
    audio_playing: bool,
    notification: Option<NotificationHandle>,
    wake_guard: Option<WakeLockGuard>,
}

impl SideEffectCoordinator {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            audio: capabilities.audio,
            notifications: capabilities.notifications,
            wake_lock: capabilities.wake_lock,
            audio_loaded: false,
            audio_playing: false,
            notification: None,
            wake_guard: None,
        }
    }

    pub fn is_audio_playing(&self) -> bool {
        self.audio_playing
    }

    pub fn holds_wake_lock(&self) -> bool {
        self.wake_guard.is_some()
    }

    pub fn has_notification(&self) -> bool {
        self.notification.is_some()
    }

    /// Forget the resolved audio source so the next play reloads it
    pub fn invalidate_audio(&mut self) {
        self.audio_loaded = false;
    }

    /// Resolve the alarm source ahead of time.
    ///
    /// Done when the countdown starts, while the host is still in the
    /// foreground; some platforms refuse to load media for background pages.
    pub fn prepare_audio(&mut self, timer: &Timer) {
        let Some(audio) = self.audio.as_mut() else {
            return;
        };
        match audio.load(&timer.id, &timer.file) {
            Ok(()) => {
                self.audio_loaded = true;
                debug!("Alarm source loaded for timer {}", timer.id);
            }
            Err(e) => {
                self.audio_loaded = false;
                warn!("Failed to load alarm source for timer {}: {}", timer.id, e);
            }
        }
    }

    /// Start the looping alarm at the timer's volume
    pub fn play_alarm(&mut self, timer: &Timer) {
        if !self.audio.is_supported() {
            debug!("Audio unsupported, skipping alarm for timer {}", timer.id);
            return;
        }
        if !self.audio_loaded {
            self.prepare_audio(timer);
        }
        let Some(audio) = self.audio.as_mut() else {
            return;
        };
        match audio.play(true, timer.clamped_volume()) {
            Ok(()) => {
                info!("Alarm playing for timer {}", timer.id);
                self.audio_playing = true;
            }
            Err(e) => warn!("Failed to play alarm for timer {}: {}", timer.id, e),
        }
    }

    /// Pause the alarm and rewind it to the start
    pub fn stop_alarm(&mut self) {
        if let Some(audio) = self.audio.as_mut() {
            if let Err(e) = audio.stop() {
                warn!("Failed to stop alarm: {}", e);
            }
        }
        self.audio_playing = false;
    }

    pub fn request_wake_lock(&mut self) {
        if self.wake_guard.is_some() {
            return;
        }
        let Some(backend) = self.wake_lock.as_mut() else {
            return;
        };
        match backend.acquire() {
            Ok(guard) => {
                debug!("Wake lock acquired");
                self.wake_guard = Some(guard);
            }
            Err(e) => warn!("Wake lock error: {}", e),
        }
    }

    pub fn release_wake_lock(&mut self) {
        if let Some(guard) = self.wake_guard.take() {
            guard.release();
            debug!("Wake lock released");
        }
    }

    /// Ask for notification permission if the user has not decided yet
    pub fn ensure_notification_permission(&mut self) -> Option<NotificationPermission> {
        let backend = self.notifications.as_mut()?;
        let permission = match backend.permission() {
            NotificationPermission::Default => backend.request_permission(),
            decided => decided,
        };
        debug!("Notification permission: {:?}", permission);
        Some(permission)
    }

    /// Replace the timer's notification with one for the given state
    pub fn show_notification(&mut self, timer: &Timer, remaining: TimeValue, is_complete: bool) {
        let Some(backend) = self.notifications.as_mut() else {
            return;
        };
        if backend.permission() != NotificationPermission::Granted {
            return;
        }

        if let Some(previous) = self.notification.take() {
            if let Err(e) = backend.close(previous) {
                debug!("Failed to close previous notification: {}", e);
            }
        }

        let request = build_notification(timer, remaining, is_complete);
        match backend.show(request) {
            Ok(handle) => self.notification = Some(handle),
            Err(e) => warn!("Failed to show notification for timer {}: {}", timer.id, e),
        }
    }

    pub fn close_notification(&mut self) {
        let Some(handle) = self.notification.take() else {
            return;
        };
        if let Some(backend) = self.notifications.as_mut() {
            if let Err(e) = backend.close(handle) {
                debug!("Failed to close notification: {}", e);
            }
        }
    }

    /// Release every platform resource this session holds
    pub fn release_all(&mut self) {
        self.stop_alarm();
        self.close_notification();
        self.release_wake_lock();
    }
}

fn build_notification(timer: &Timer, remaining: TimeValue, is_complete: bool) -> NotificationRequest {
    let (title, body) = if is_complete {
        (format!("{} Complete!", timer.name), "Timer has finished".to_string())
    } else {
        (timer.name.clone(), format!("Time remaining: {}", remaining))
    };
    NotificationRequest {
        timer_id: timer.id.clone(),
        tag: format!("timer-{}", timer.id),
        title,
        body,
        require_interaction: is_complete,
        silent: !is_complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockPlatform;

    fn timer() -> Timer {
        Timer::new("t1", "Tea", TimeValue::new(0, 3, 0))
    }

    #[test]
    fn in_progress_notification_is_silent() {
        let request = build_notification(&timer(), TimeValue::new(0, 2, 5), false);
        assert_eq!(request.title, "Tea");
        assert_eq!(request.body, "Time remaining: 00:02:05");
        assert_eq!(request.tag, "timer-t1");
        assert!(request.silent);
        assert!(!request.require_interaction);
    }

    #[test]
    fn completion_notification_requires_interaction() {
        let request = build_notification(&timer(), TimeValue::ZERO, true);
        assert_eq!(request.title, "Tea Complete!");
        assert_eq!(request.body, "Timer has finished");
        assert!(!request.silent);
        assert!(request.require_interaction);
    }

    #[test]
    fn notifications_replace_rather_than_stack() {
        let platform = MockPlatform::new();
        let mut effects = SideEffectCoordinator::new(platform.backends());
        let timer = timer();

        effects.show_notification(&timer, TimeValue::new(0, 2, 0), false);
        effects.show_notification(&timer, TimeValue::new(0, 1, 55), false);
        effects.show_notification(&timer, TimeValue::ZERO, true);

        assert_eq!(platform.notifications.shown().len(), 3);
        assert_eq!(platform.notifications.open_count(), 1);
    }

    #[test]
    fn denied_permission_skips_notifications() {
        let platform = MockPlatform::new();
        platform.notifications.set_permission(NotificationPermission::Denied);
        let mut effects = SideEffectCoordinator::new(platform.backends());

        effects.show_notification(&timer(), TimeValue::new(0, 1, 0), false);
        assert!(platform.notifications.shown().is_empty());
        assert!(!effects.has_notification());
    }

    #[test]
    fn default_permission_is_requested() {
        let platform = MockPlatform::new();
        platform.notifications.set_permission(NotificationPermission::Default);
        let mut effects = SideEffectCoordinator::new(platform.backends());

        assert_eq!(
            effects.ensure_notification_permission(),
            Some(NotificationPermission::Granted)
        );
    }

    #[test]
    fn unsupported_capabilities_are_silent_noops() {
        let mut effects = SideEffectCoordinator::new(Capabilities::none());
        let timer = timer();
        effects.request_wake_lock();
        effects.show_notification(&timer, TimeValue::ZERO, true);
        effects.play_alarm(&timer);
        effects.release_all();
        assert!(!effects.holds_wake_lock());
        assert!(!effects.is_audio_playing());
        assert_eq!(effects.ensure_notification_permission(), None);
    }

    #[test]
    fn failed_playback_is_swallowed() {
        let platform = MockPlatform::new();
        platform.audio.fail_play(true);
        let mut effects = SideEffectCoordinator::new(platform.backends());
        effects.play_alarm(&timer());
        assert_eq!(platform.audio.play_count(), 0);
        assert!(!effects.is_audio_playing());
    }

    #[test]
    fn wake_lock_is_acquired_once_and_released() {
        let platform = MockPlatform::new();
        let mut effects = SideEffectCoordinator::new(platform.backends());
        effects.request_wake_lock();
        effects.request_wake_lock();
        assert_eq!(platform.wake_lock.acquisitions(), 1);
        assert_eq!(platform.wake_lock.held(), 1);
        effects.release_wake_lock();
        assert_eq!(platform.wake_lock.held(), 0);
    }
}
