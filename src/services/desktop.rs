//! Desktop capability backends built on external commands
//!
//! Notifications go through `notify-send`, the wake-lock is a `systemd-inhibit`
//! child process held for as long as the countdown runs, and the alarm is played
//! by an external audio player restarted in a loop.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Stdio,
    sync::{Arc, Mutex},
};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    runtime::Handle,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::capabilities::{
    handle_notification_click, AudioBackend, Capabilities, Capability, CapabilityProvider,
    EffectError, EffectResult, Navigator, NotificationBackend, NotificationHandle,
    NotificationPermission, NotificationRequest, WakeLockBackend, WakeLockGuard,
};
use crate::state::{AudioSource, TimerId};

const APP_NAME: &str = "countdown-widget";

/// Which desktop backends to try
#[derive(Debug, Clone)]
pub struct DesktopConfig {
    pub audio_player: String,
    pub notifications: bool,
    pub wake_lock: bool,
    pub scratch_dir: PathBuf,
}

/// Capability provider for a Linux desktop session
#[derive(Debug, Clone)]
pub struct DesktopCapabilities {
    audio_player: Option<String>,
    notifications: bool,
    wake_lock: bool,
    scratch_dir: PathBuf,
}

impl DesktopCapabilities {
    /// Check which external tools are installed
    pub async fn probe(config: &DesktopConfig) -> Self {
        let audio_player = if command_available(&config.audio_player).await {
            Some(config.audio_player.clone())
        } else {
            warn!("Audio player '{}' not available, alarms will be silent", config.audio_player);
            None
        };

        let notifications = config.notifications && command_available("notify-send").await;
        if config.notifications && !notifications {
            warn!("notify-send not available, notifications disabled");
        }

        let wake_lock = config.wake_lock && command_available("systemd-inhibit").await;
        if config.wake_lock && !wake_lock {
            warn!("systemd-inhibit not available, wake-lock disabled");
        }

        info!(
            "Desktop capabilities: audio={}, notifications={}, wake_lock={}",
            audio_player.is_some(),
            notifications,
            wake_lock
        );

        Self {
            audio_player,
            notifications,
            wake_lock,
            scratch_dir: config.scratch_dir.clone(),
        }
    }
}

impl CapabilityProvider for DesktopCapabilities {
    fn capabilities(&self, navigator: Arc<dyn Navigator>) -> Capabilities {
        let audio: Capability<Box<dyn AudioBackend>> = match &self.audio_player {
            Some(player) => Capability::Supported(Box::new(DesktopAudio::new(
                player.clone(),
                self.scratch_dir.clone(),
            ))),
            None => Capability::Unsupported,
        };
        let notifications: Capability<Box<dyn NotificationBackend>> = if self.notifications {
            Capability::Supported(Box::new(DesktopNotifier::new(navigator)))
        } else {
            Capability::Unsupported
        };
        let wake_lock: Capability<Box<dyn WakeLockBackend>> = if self.wake_lock {
            Capability::Supported(Box::new(InhibitWakeLock))
        } else {
            Capability::Unsupported
        };

        Capabilities { audio, notifications, wake_lock }
    }
}

/// Check if a program can be executed
async fn command_available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok()
}

fn runtime() -> EffectResult<Handle> {
    Handle::try_current().map_err(|_| EffectError::NoRuntime)
}

/// Alarm playback through an external player
pub struct DesktopAudio {
    player: String,
    scratch_dir: PathBuf,
    location: Option<String>,
    playback: Option<JoinHandle<()>>,
}

impl DesktopAudio {
    pub fn new(player: String, scratch_dir: PathBuf) -> Self {
        Self {
            player,
            scratch_dir,
            location: None,
            playback: None,
        }
    }

    /// Write in-memory audio to a scratch file the player can open
    fn materialize(&self, timer_id: &TimerId, mime: Option<&str>, data: &[u8]) -> EffectResult<PathBuf> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let stem: String = timer_id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let path = self
            .scratch_dir
            .join(format!("{}-{}.{}", APP_NAME, stem, extension_for(mime)));
        std::fs::write(&path, data)?;
        Ok(path)
    }
}

impl AudioBackend for DesktopAudio {
    fn load(&mut self, timer_id: &TimerId, source: &AudioSource) -> EffectResult<()> {
        let location = match source {
            AudioSource::Url { url } => url.strip_prefix("file://").unwrap_or(url).to_string(),
            AudioSource::Blob { mime, data } => {
                let path = self.materialize(timer_id, mime.as_deref(), data)?;
                path.display().to_string()
            }
        };
        debug!("Alarm source for {} resolved to {}", timer_id, location);
        self.location = Some(location);
        Ok(())
    }

    fn play(&mut self, looping: bool, volume: f32) -> EffectResult<()> {
        let location = self
            .location
            .clone()
            .ok_or_else(|| EffectError::Backend("no alarm source loaded".into()))?;
        let handle = runtime()?;
        self.stop()?;

        let player = self.player.clone();
        let args = player_args(&player, volume);
        self.playback = Some(handle.spawn(async move {
            loop {
                let status = Command::new(&player)
                    .args(&args)
                    .arg(&location)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .status()
                    .await;
                match status {
                    Ok(status) if status.success() => {}
                    Ok(status) => {
                        warn!("{} exited with {} playing {}", player, status, location);
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to run {}: {}", player, e);
                        break;
                    }
                }
                if !looping {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> EffectResult<()> {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
        Ok(())
    }
}

impl Drop for DesktopAudio {
    fn drop(&mut self) {
        if let Some(playback) = self.playback.take() {
            playback.abort();
        }
    }
}

fn extension_for(mime: Option<&str>) -> &'static str {
    match mime {
        Some("audio/mpeg") | Some("audio/mp3") => "mp3",
        Some("audio/wav") | Some("audio/x-wav") | Some("audio/wave") => "wav",
        Some("audio/flac") => "flac",
        Some("audio/webm") => "webm",
        Some("audio/mp4") | Some("audio/aac") => "m4a",
        _ => "ogg",
    }
}

/// Volume (0.0..=1.0) and quiet-mode flags in the dialect of known players
fn player_args(player: &str, volume: f32) -> Vec<String> {
    let program = Path::new(player)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(player);
    match program {
        "paplay" => vec![format!("--volume={}", (volume * 65536.0).round() as u32)],
        "pw-play" | "pw-cat" => vec![format!("--volume={:.2}", volume)],
        "mpv" => vec![
            "--no-video".to_string(),
            "--really-quiet".to_string(),
            format!("--volume={}", (volume * 100.0).round() as u32),
        ],
        "ffplay" => vec![
            "-nodisp".to_string(),
            "-autoexit".to_string(),
            "-loglevel".to_string(),
            "quiet".to_string(),
            "-volume".to_string(),
            ((volume * 100.0).round() as u32).to_string(),
        ],
        _ => Vec::new(),
    }
}

/// What the waiter task and `close` share about one displayed notification
#[derive(Debug, Default)]
struct ShownState {
    server_id: Option<u32>,
    close_requested: bool,
}

struct ShownNotification {
    state: Arc<Mutex<ShownState>>,
    waiter: JoinHandle<()>,
}

/// Notifications via `notify-send --wait`, which reports the server id and
/// the invoked action on stdout. The last server id seen for a tag is passed
/// as `--replace-id` so a timer's notifications replace each other.
pub struct DesktopNotifier {
    navigator: Arc<dyn Navigator>,
    next_handle: u64,
    shown: HashMap<u64, ShownNotification>,
    server_ids: Arc<Mutex<HashMap<String, u32>>>,
}

impl DesktopNotifier {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            next_handle: 1,
            shown: HashMap::new(),
            server_ids: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn replace_id_for(&self, tag: &str) -> Option<u32> {
        self.server_ids.lock().ok().and_then(|ids| ids.get(tag).copied())
    }
}

fn close_on_server(handle: &Handle, server_id: u32) {
    handle.spawn(async move {
        let result = Command::new("gdbus")
            .args([
                "call",
                "--session",
                "--dest",
                "org.freedesktop.Notifications",
                "--object-path",
                "/org/freedesktop/Notifications",
                "--method",
                "org.freedesktop.Notifications.CloseNotification",
            ])
            .arg(server_id.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        if let Err(e) = result {
            debug!("Failed to close notification {}: {}", server_id, e);
        }
    });
}

/// Arguments for one `notify-send` invocation
fn notify_args(request: &NotificationRequest, replace_id: Option<u32>) -> Vec<String> {
    let mut args = vec![
        format!("--app-name={}", APP_NAME),
        "--print-id".to_string(),
        "--wait".to_string(),
        "--action=default=Open".to_string(),
        format!(
            "--urgency={}",
            if request.require_interaction { "critical" } else { "low" }
        ),
    ];
    if let Some(id) = replace_id {
        args.push(format!("--replace-id={}", id));
    }
    if request.silent {
        args.push("--hint=boolean:suppress-sound:true".to_string());
    }
    args.push(request.title.clone());
    args.push(request.body.clone());
    args
}

impl NotificationBackend for DesktopNotifier {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn request_permission(&mut self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn show(&mut self, request: NotificationRequest) -> EffectResult<NotificationHandle> {
        let handle = runtime()?;
        let _guard = handle.enter();

        let mut child = Command::new("notify-send")
            .args(notify_args(&request, self.replace_id_for(&request.tag)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EffectError::Backend("notify-send stdout unavailable".into()))?;
        let state = Arc::new(Mutex::new(ShownState::default()));
        let shared = state.clone();
        let server_ids = self.server_ids.clone();
        let navigator = self.navigator.clone();
        let timer_id = request.timer_id.clone();
        let tag = request.tag;
        let runtime = handle.clone();

        let waiter = handle.spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if let Ok(id) = line.parse::<u32>() {
                    if let Ok(mut ids) = server_ids.lock() {
                        ids.insert(tag.clone(), id);
                    }
                    let close_now = match shared.lock() {
                        Ok(mut shown) => {
                            shown.server_id = Some(id);
                            shown.close_requested
                        }
                        Err(_) => false,
                    };
                    // Closed before the server id was known
                    if close_now {
                        close_on_server(&runtime, id);
                        break;
                    }
                } else if line == "default" {
                    handle_notification_click(navigator.as_ref(), &timer_id);
                }
            }
            let _ = child.wait().await;
        });

        let id = self.next_handle;
        self.next_handle += 1;
        self.shown.insert(id, ShownNotification { state, waiter });
        Ok(NotificationHandle(id))
    }

    fn close(&mut self, handle: NotificationHandle) -> EffectResult<()> {
        let Some(shown) = self.shown.remove(&handle.0) else {
            return Ok(());
        };

        let server_id = match shown.state.lock() {
            Ok(mut state) => {
                state.close_requested = true;
                state.server_id
            }
            Err(_) => None,
        };
        match server_id {
            Some(server_id) => {
                shown.waiter.abort();
                close_on_server(&runtime()?, server_id);
            }
            // The waiter closes it as soon as notify-send reports the id
            None => debug!("Deferring close of notification {} until its id is known", handle.0),
        }
        Ok(())
    }
}

impl Drop for DesktopNotifier {
    fn drop(&mut self) {
        for (_, shown) in self.shown.drain() {
            shown.waiter.abort();
        }
    }
}

/// Wake-lock held by a `systemd-inhibit` child process
pub struct InhibitWakeLock;

impl WakeLockBackend for InhibitWakeLock {
    fn acquire(&mut self) -> EffectResult<WakeLockGuard> {
        let handle = runtime()?;
        let _guard = handle.enter();

        let who = format!("--who={}", APP_NAME);
        let mut child = Command::new("systemd-inhibit")
            .args([
                "--what=idle",
                who.as_str(),
                "--why=Countdown running",
                "--mode=block",
                "sleep",
                "infinity",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        Ok(WakeLockGuard::new(move || {
            if let Err(e) = child.start_kill() {
                debug!("Wake lock process already gone: {}", e);
            }
        }))
    }
}
