//! Tracker settings, loaded from an optional JSON file.
//!
//! Every section falls back to its defaults, so a settings file only needs
//! the keys it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::{ScheduleError, SyncConfig};

/// Days without activity before a student counts as needing attention.
pub const DEFAULT_INACTIVITY_THRESHOLD_DAYS: u32 = 7;
pub const DEFAULT_MAX_REMINDERS: u32 = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid sync schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("inactivity threshold must be at least one day")]
    InactivityThreshold,

    #[error("sync failure rate {0} is outside 0.0-1.0")]
    FailureRate(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    pub inactivity_threshold_days: u32,
    pub max_reminders: u32,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            inactivity_threshold_days: DEFAULT_INACTIVITY_THRESHOLD_DAYS,
            max_reminders: DEFAULT_MAX_REMINDERS,
        }
    }
}

/// Simulated backend latency and flakiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencySettings {
    pub profile_ms: u64,
    pub sync_ms: u64,
    /// Chance that a rating refresh fails as if the platform were down.
    pub sync_failure_rate: f64,
}

impl Default for LatencySettings {
    fn default() -> Self {
        Self {
            profile_ms: 500,
            sync_ms: 2000,
            sync_failure_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sync: SyncConfig,
    pub reminders: ReminderSettings,
    pub latency: LatencySettings,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let settings: Settings =
                    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                        path: path.to_path_buf(),
                        source,
                    })?;
                tracing::debug!("Loaded settings from {}", path.display());
                settings
            }
            None => Settings::default(),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync.validate()?;
        if self.reminders.inactivity_threshold_days == 0 {
            return Err(ConfigError::InactivityThreshold);
        }
        let rate = self.latency.sync_failure_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::FailureRate(rate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::schedule::Frequency;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.reminders.inactivity_threshold_days, 7);
        assert_eq!(settings.reminders.max_reminders, 3);
        assert_eq!(settings.sync.cadence.time, "02:00");
        assert_eq!(settings.latency.sync_ms, 2000);
        assert_eq!(settings.latency.sync_failure_rate, 0.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sync": {{"frequency": "custom", "custom_interval_hours": 4}}, "reminders": {{"max_reminders": 5}}}}"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.sync.cadence.frequency, Frequency::Custom);
        assert_eq!(settings.sync.cadence.custom_interval_hours, 4);
        assert_eq!(settings.reminders.max_reminders, 5);
        assert_eq!(settings.reminders.inactivity_threshold_days, 7);
        assert_eq!(settings.latency, LatencySettings::default());
    }

    #[test]
    fn rejects_bad_schedule() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sync": {{"time": "25:00"}}}}"#).unwrap();

        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Schedule(ScheduleError::InvalidTime(_))));
    }

    #[test]
    fn rejects_failure_rate_outside_unit_range() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"latency": {{"sync_failure_rate": 1.5}}}}"#).unwrap();

        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::FailureRate(rate) if rate == 1.5));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/settings.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
