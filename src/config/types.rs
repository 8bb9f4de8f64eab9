//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scheduler::DEFAULT_REFRESH_HZ;

/// Delay settings applied at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Delay in milliseconds (0 = pass-through)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Start with delaying suspended
    #[serde(default)]
    pub paused: bool,
}

fn default_delay_ms() -> u64 {
    500
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            paused: false,
        }
    }
}

/// Ring buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Slots per session (minimum 2)
    ///
    /// Should cover `delay_ms * source frame rate / 1000` frames; smaller
    /// rings overwrite frames playback still wants.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    60
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Display refresh rate driving the playback loop (Hz)
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: u32,
}

fn default_refresh_hz() -> u32 {
    DEFAULT_REFRESH_HZ
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_hz: default_refresh_hz(),
        }
    }
}

/// Synthetic source configuration for the demo host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Content width in pixels
    #[serde(default = "default_source_width")]
    pub width: u32,

    /// Content height in pixels
    #[serde(default = "default_source_height")]
    pub height: u32,

    /// Native frame rate (FPS)
    #[serde(default = "default_source_frame_rate")]
    pub frame_rate: u32,

    /// Number of independent sources
    #[serde(default = "default_source_count")]
    pub count: usize,
}

fn default_source_width() -> u32 {
    640
}
fn default_source_height() -> u32 {
    360
}
fn default_source_frame_rate() -> u32 {
    30
}
fn default_source_count() -> usize {
    1
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: default_source_width(),
            height: default_source_height(),
            frame_rate: default_source_frame_rate(),
            count: default_source_count(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file (None = console only)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Seconds between session statistics reports (0 = never)
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stats_interval_secs() -> u64 {
    5
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: None,
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}
