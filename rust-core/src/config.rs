//! Recorder configuration.
//!
//! All fields have defaults, so an empty TOML document is a valid config.
//!
//! ```toml
//! samples_per_minute = 10.0
//! mode_shift_speed_mps = 13.9
//! sleep_sample_retention = 10
//! visit_keeper_min_duration_ms = 120000
//! visit_keeper_min_samples = 2
//! event_capacity = 256
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cadence::MIN_SAMPLES_PER_MINUTE;
use crate::error::ConfigError;
use crate::events;
use crate::timeline::KeeperThresholds;

/// Configuration for the timeline recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Target rate at which sample-ready signals become recorded samples.
    pub samples_per_minute: f64,

    /// Speed (m/s) above which a change of moving activity type is ignored
    /// when both edge samples exceed it. Typical: 13.9 m/s (50 km/h).
    pub mode_shift_speed_mps: f64,

    /// Maximum number of non-active samples a visit retains while the
    /// device is in low-power sampling.
    pub sleep_sample_retention: usize,

    /// Minimum visit duration before low-power sampling is allowed.
    pub visit_keeper_min_duration_ms: u64,

    /// Minimum visit sample count before low-power sampling is allowed.
    pub visit_keeper_min_samples: usize,

    /// Buffer size of the outward event channel.
    pub event_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            samples_per_minute: 10.0,
            mode_shift_speed_mps: 13.9,
            sleep_sample_retention: 10,
            visit_keeper_min_duration_ms: 120_000,
            visit_keeper_min_samples: 2,
            event_capacity: events::DEFAULT_CAPACITY,
        }
    }
}

impl RecorderConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: RecorderConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.samples_per_minute.is_finite() || self.samples_per_minute < MIN_SAMPLES_PER_MINUTE {
            return Err(ConfigError::Invalid {
                field: "samples_per_minute",
                reason: format!(
                    "must be at least {MIN_SAMPLES_PER_MINUTE} (one per day), got {}",
                    self.samples_per_minute
                ),
            });
        }
        if !self.mode_shift_speed_mps.is_finite() || self.mode_shift_speed_mps < 0.0 {
            return Err(ConfigError::Invalid {
                field: "mode_shift_speed_mps",
                reason: format!("must be zero or more, got {}", self.mode_shift_speed_mps),
            });
        }
        if self.sleep_sample_retention == 0 {
            return Err(ConfigError::Invalid {
                field: "sleep_sample_retention",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn keeper_thresholds(&self) -> KeeperThresholds {
        KeeperThresholds {
            min_duration_ms: self.visit_keeper_min_duration_ms,
            min_samples: self.visit_keeper_min_samples,
        }
    }
}
