//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::{services::DesktopConfig, state::SessionOptions};

/// CLI argument parsing structure
#[derive(Parser, Debug, Clone)]
#[command(name = "countdown-widget")]
#[command(about = "A resumable countdown timer with alarm, notification and wake-lock support")]
#[command(version)]
pub struct Config {
    /// Port to bind the control API to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding timers.json and countdown snapshots
    #[arg(short, long, default_value = "./countdown-data")]
    pub data_dir: PathBuf,

    /// Program used to play alarm sounds
    #[arg(long, default_value = "paplay")]
    pub audio_player: String,

    /// Never show desktop notifications
    #[arg(long)]
    pub no_notifications: bool,

    /// Never keep the display awake while counting down
    #[arg(long)]
    pub no_wake_lock: bool,

    /// Stop ticking while hidden and catch up when visible again
    #[arg(long)]
    pub suspend_when_hidden: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    pub fn timers_path(&self) -> PathBuf {
        self.data_dir.join("timers.json")
    }

    pub fn desktop_config(&self) -> DesktopConfig {
        DesktopConfig {
            audio_player: self.audio_player.clone(),
            notifications: !self.no_notifications,
            wake_lock: !self.no_wake_lock,
            scratch_dir: self.data_dir.join("audio"),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            suspend_when_hidden: self.suspend_when_hidden,
            ..SessionOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["countdown-widget"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.timers_path(), PathBuf::from("./countdown-data/timers.json"));
        assert!(config.desktop_config().notifications);
        assert!(!config.session_options().suspend_when_hidden);
    }

    #[test]
    fn flags() {
        let config = Config::try_parse_from([
            "countdown-widget",
            "-p",
            "9000",
            "-d",
            "/tmp/cw",
            "--no-notifications",
            "--no-wake-lock",
            "--suspend-when-hidden",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.snapshot_dir(), PathBuf::from("/tmp/cw/snapshots"));
        let desktop = config.desktop_config();
        assert!(!desktop.notifications);
        assert!(!desktop.wake_lock);
        assert!(config.session_options().suspend_when_hidden);
        assert_eq!(config.log_level(), "debug");
    }
}
