//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - Environment variables and CLI arguments (via overrides)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod types;

pub use types::{BufferConfig, DelayConfig, DisplayConfig, LoggingConfig, SourceConfig};

use crate::controller::DelaySettings;
use crate::frame::Capacity;
use crate::scheduler::Scheduler;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Delay settings
    #[serde(default)]
    pub delay: DelayConfig,
    /// Ring buffer configuration
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Display configuration
    #[serde(default)]
    pub display: DisplayConfig,
    /// Demo source configuration
    #[serde(default)]
    pub source: SourceConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Capacity::new(self.buffer.capacity).context("Invalid buffer capacity in config")?;

        if self.display.refresh_hz == 0 {
            anyhow::bail!("Invalid display refresh rate: must be at least 1 Hz");
        }

        if self.source.frame_rate == 0 {
            anyhow::bail!("Invalid source frame rate: must be at least 1 FPS");
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        Ok(())
    }

    /// Override config with CLI arguments
    pub fn with_overrides(mut self, delay_ms: Option<u64>, paused: Option<bool>) -> Self {
        if let Some(delay_ms) = delay_ms {
            self.delay.delay_ms = delay_ms;
        }
        if let Some(paused) = paused {
            self.delay.paused = paused;
        }
        self
    }

    /// Delay settings for the controller
    pub fn delay_settings(&self) -> DelaySettings {
        DelaySettings {
            delay_ms: self.delay.delay_ms,
            paused: self.delay.paused,
        }
    }

    /// Validated ring capacity
    pub fn capacity(&self) -> Result<Capacity> {
        Capacity::new(self.buffer.capacity).context("Invalid buffer capacity in config")
    }

    /// Scheduler for the configured display
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.display.refresh_hz)
    }

    /// Frames the ring must hold to span the configured delay
    pub fn frames_needed(&self) -> u64 {
        self.delay
            .delay_ms
            .saturating_mul(self.source.frame_rate as u64)
            .div_ceil(1000)
            .saturating_add(1)
    }
}
