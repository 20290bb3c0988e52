//! Recording capability backends for testing

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::capabilities::{
    handle_notification_click, AudioBackend, Capabilities, Capability, CapabilityProvider,
    EffectError, EffectResult, NotificationBackend, NotificationHandle, NotificationPermission,
    NotificationRequest, Navigator, WakeLockBackend, WakeLockGuard,
};
use crate::state::{AudioSource, TimerId};

#[derive(Debug, Default)]
struct AudioLog {
    loads: Vec<(TimerId, AudioSource)>,
    plays: Vec<(bool, f32)>,
    stops: usize,
    playing: bool,
    fail_play: bool,
}

/// Audio backend that records calls instead of making sound
#[derive(Debug, Clone, Default)]
pub struct MockAudio {
    log: Arc<Mutex<AudioLog>>,
}

impl MockAudio {
    pub fn fail_play(&self, fail: bool) {
        self.log.lock().unwrap().fail_play = fail;
    }

    pub fn load_count(&self) -> usize {
        self.log.lock().unwrap().loads.len()
    }

    pub fn play_count(&self) -> usize {
        self.log.lock().unwrap().plays.len()
    }

    pub fn stop_count(&self) -> usize {
        self.log.lock().unwrap().stops
    }

    pub fn is_playing(&self) -> bool {
        self.log.lock().unwrap().playing
    }

    /// Looping flag and volume of the most recent play
    pub fn last_play(&self) -> Option<(bool, f32)> {
        self.log.lock().unwrap().plays.last().copied()
    }
}

impl AudioBackend for MockAudio {
    fn load(&mut self, timer_id: &TimerId, source: &AudioSource) -> EffectResult<()> {
        self.log
            .lock()
            .unwrap()
            .loads
            .push((timer_id.clone(), source.clone()));
        Ok(())
    }

    fn play(&mut self, looping: bool, volume: f32) -> EffectResult<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_play {
            return Err(EffectError::Backend("Mock play failure".into()));
        }
        log.plays.push((looping, volume));
        log.playing = true;
        Ok(())
    }

    fn stop(&mut self) -> EffectResult<()> {
        let mut log = self.log.lock().unwrap();
        log.stops += 1;
        log.playing = false;
        Ok(())
    }
}

struct NotifierState {
    permission: NotificationPermission,
    shown: Vec<NotificationRequest>,
    open: BTreeMap<u64, NotificationRequest>,
    next_id: u64,
    navigator: Option<Arc<dyn Navigator>>,
}

/// Notification backend that keeps displayed notifications in memory
#[derive(Clone)]
pub struct MockNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(NotifierState {
                permission: NotificationPermission::Granted,
                shown: Vec::new(),
                open: BTreeMap::new(),
                next_id: 1,
                navigator: None,
            })),
        }
    }
}

impl MockNotifier {
    pub fn set_permission(&self, permission: NotificationPermission) {
        self.state.lock().unwrap().permission = permission;
    }

    fn set_navigator(&self, navigator: Arc<dyn Navigator>) {
        self.state.lock().unwrap().navigator = Some(navigator);
    }

    /// Every notification ever shown, oldest first
    pub fn shown(&self) -> Vec<NotificationRequest> {
        self.state.lock().unwrap().shown.clone()
    }

    pub fn last_shown(&self) -> Option<NotificationRequest> {
        self.state.lock().unwrap().shown.last().cloned()
    }

    /// Notifications currently on screen
    pub fn open(&self) -> Vec<NotificationRequest> {
        self.state.lock().unwrap().open.values().cloned().collect()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open.len()
    }

    /// Simulate the user clicking the newest open notification
    pub fn click_latest(&self) -> bool {
        let (navigator, timer_id) = {
            let state = self.state.lock().unwrap();
            let Some((_, request)) = state.open.iter().next_back() else {
                return false;
            };
            (state.navigator.clone(), request.timer_id.clone())
        };
        match navigator {
            Some(navigator) => {
                handle_notification_click(navigator.as_ref(), &timer_id);
                true
            }
            None => false,
        }
    }
}

impl NotificationBackend for MockNotifier {
    fn permission(&self) -> NotificationPermission {
        self.state.lock().unwrap().permission
    }

    fn request_permission(&mut self) -> NotificationPermission {
        let mut state = self.state.lock().unwrap();
        if state.permission == NotificationPermission::Default {
            state.permission = NotificationPermission::Granted;
        }
        state.permission
    }

    fn show(&mut self, request: NotificationRequest) -> EffectResult<NotificationHandle> {
        let mut state = self.state.lock().unwrap();
        if state.permission != NotificationPermission::Granted {
            return Err(EffectError::PermissionDenied);
        }
        let id = state.next_id;
        state.next_id += 1;
        // Same tag replaces, as platforms do
        state.open.retain(|_, open| open.tag != request.tag);
        state.open.insert(id, request.clone());
        state.shown.push(request);
        Ok(NotificationHandle(id))
    }

    fn close(&mut self, handle: NotificationHandle) -> EffectResult<()> {
        self.state.lock().unwrap().open.remove(&handle.0);
        Ok(())
    }
}

/// Wake-lock backend that counts held guards
#[derive(Debug, Clone, Default)]
pub struct MockWakeLock {
    acquisitions: Arc<AtomicUsize>,
    held: Arc<AtomicUsize>,
}

impl MockWakeLock {
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }
}

impl WakeLockBackend for MockWakeLock {
    fn acquire(&mut self) -> EffectResult<WakeLockGuard> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.held.fetch_add(1, Ordering::SeqCst);
        let held = self.held.clone();
        Ok(WakeLockGuard::new(move || {
            held.fetch_sub(1, Ordering::SeqCst);
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    Focus,
    OpenTimer(TimerId),
    Home,
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    events: Mutex<Vec<NavEvent>>,
}

impl RecordingNavigator {
    pub fn events(&self) -> Vec<NavEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn focus(&self) {
        self.events.lock().unwrap().push(NavEvent::Focus);
    }

    fn open_timer(&self, timer_id: &TimerId) {
        self.events
            .lock()
            .unwrap()
            .push(NavEvent::OpenTimer(timer_id.clone()));
    }

    fn go_home(&self) {
        self.events.lock().unwrap().push(NavEvent::Home);
    }
}

/// A full set of recording backends sharing state with the test
#[derive(Clone, Default)]
pub struct MockPlatform {
    pub audio: MockAudio,
    pub notifications: MockNotifier,
    pub wake_lock: MockWakeLock,
    pub navigator: Arc<RecordingNavigator>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backends wired to this platform's own navigator
    pub fn backends(&self) -> Capabilities {
        self.notifications.set_navigator(self.navigator.clone());
        self.boxed()
    }

    fn boxed(&self) -> Capabilities {
        Capabilities {
            audio: Capability::Supported(Box::new(self.audio.clone())),
            notifications: Capability::Supported(Box::new(self.notifications.clone())),
            wake_lock: Capability::Supported(Box::new(self.wake_lock.clone())),
        }
    }
}

impl CapabilityProvider for MockPlatform {
    fn capabilities(&self, navigator: Arc<dyn Navigator>) -> Capabilities {
        self.notifications.set_navigator(navigator);
        self.boxed()
    }
}
