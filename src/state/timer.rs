//! Configured timer entity

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TimeValue;

/// Stable identity of a configured timer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Where the alarm sound comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AudioSource {
    /// A URL or filesystem path the audio backend can open directly
    Url { url: String },
    /// Audio data held in memory; must be resolved to a playable location first
    Blob {
        #[serde(default)]
        mime: Option<String>,
        data: Vec<u8>,
    },
}

impl AudioSource {
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }
}

/// A configured countdown timer as stored in the durable timer list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: TimerId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub time: TimeValue,
    pub file: AudioSource,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub is_one_time: bool,
    #[serde(default)]
    pub is_interval: bool,
}

fn default_volume() -> f32 {
    1.0
}

impl Timer {
    pub fn new(id: impl Into<TimerId>, name: impl Into<String>, time: TimeValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: None,
            time,
            file: AudioSource::url("alarm.ogg"),
            volume: 1.0,
            is_one_time: false,
            is_interval: false,
        }
    }

    pub fn one_time(mut self) -> Self {
        self.is_one_time = true;
        self
    }

    pub fn interval(mut self) -> Self {
        self.is_interval = true;
        self
    }

    /// Volume clamped into the 0.0..=1.0 range
    pub fn clamped_volume(&self) -> f32 {
        if self.volume.is_nan() {
            return 1.0;
        }
        self.volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_list_entry_with_defaults() {
        let json = r#"{
            "id": "abc",
            "name": "Tea",
            "time": {"hours": 0, "minutes": 3, "seconds": 0},
            "file": {"kind": "url", "url": "/sounds/bell.mp3"}
        }"#;
        let timer: Timer = serde_json::from_str(json).unwrap();
        assert_eq!(timer.id.as_str(), "abc");
        assert_eq!(timer.time, TimeValue::new(0, 3, 0));
        assert_eq!(timer.volume, 1.0);
        assert!(!timer.is_one_time && !timer.is_interval);
    }

    #[test]
    fn serializes_flags_in_camel_case() {
        let timer = Timer::new("t1", "Eggs", TimeValue::new(0, 6, 0)).one_time();
        let value = serde_json::to_value(&timer).unwrap();
        assert_eq!(value["isOneTime"], true);
        assert_eq!(value["isInterval"], false);
    }

    #[test]
    fn volume_is_clamped() {
        let mut timer = Timer::new("t1", "Loud", TimeValue::new(0, 0, 5));
        timer.volume = 3.5;
        assert_eq!(timer.clamped_volume(), 1.0);
        timer.volume = -1.0;
        assert_eq!(timer.clamped_volume(), 0.0);
    }
}
