//! Channel and playback configuration.
//!
//! Every field has a default, so a YAML document only needs the settings it
//! changes:
//!
//! ```rust
//! use irtelemetry::TelemetryConfig;
//! use std::time::Duration;
//!
//! let config = TelemetryConfig::from_yaml_str("live:\n  frame_timeout: 50\nplayback:\n  speed: 2.0\n").unwrap();
//! assert_eq!(config.live.frame_timeout, Duration::from_millis(50));
//! assert_eq!(config.live.torn_read_attempts, 2);
//! assert_eq!(config.playback.speed(), 2.0);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, TelemetryError};

const MIN_SPEED: f64 = 0.1;
const MAX_SPEED: f64 = 10.0;

/// Live channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Longest single wait on the data-ready event, in milliseconds
    #[serde(with = "duration_ms")]
    pub frame_timeout: Duration,

    /// Copies attempted before a torn frame is reported as inconsistent
    pub torn_read_attempts: u32,

    /// Time without a fresh frame after which the source counts as disconnected
    #[serde(with = "duration_ms")]
    pub connection_timeout: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_millis(16),
            torn_read_attempts: 2,
            connection_timeout: Duration::from_secs(30),
        }
    }
}

impl LiveConfig {
    pub fn frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    /// Set the torn-read budget (at least one attempt is always made).
    pub fn torn_read_attempts(mut self, attempts: u32) -> Self {
        self.torn_read_attempts = attempts.max(1);
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Disk playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    speed: f64,

    /// Pace frames by their recorded `SessionTime`; otherwise run as fast as possible
    pub realtime: bool,

    /// Restart from the first valid sample at end of data
    pub loop_at_end: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self { speed: 1.0, realtime: true, loop_at_end: false }
    }
}

impl PlaybackOptions {
    /// As fast as possible, no looping.
    pub fn unpaced() -> Self {
        Self { realtime: false, ..Self::default() }
    }

    /// Playback speed multiplier, always within `0.1..=10.0`.
    pub fn speed(&self) -> f64 {
        if self.speed.is_finite() { self.speed.clamp(MIN_SPEED, MAX_SPEED) } else { 1.0 }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn loop_at_end(mut self, enabled: bool) -> Self {
        self.loop_at_end = enabled;
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub live: LiveConfig,
    pub playback: PlaybackOptions,
}

impl TelemetryConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text).map_err(|e| TelemetryError::parse("telemetry config", e.to_string()))
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| TelemetryError::parse("telemetry config", e.to_string()))
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
