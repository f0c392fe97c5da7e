//! Daemon configuration.
//!
//! TOML file with per-field defaults, so an empty file (or no file at all)
//! yields a working configuration:
//!
//! ```toml
//! [store]
//! path = "/var/lib/capsuled/capsules.db"
//!
//! [sweeper]
//! interval = "1h"
//! retention = "30d"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sweeper::{DEFAULT_RETENTION, DEFAULT_SWEEP_INTERVAL, SweeperConfig};

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the TOML content.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level `capsuled` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapsuledConfig {
    /// Store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Sweeper settings.
    #[serde(default)]
    pub sweeper: SweeperSettings,
}

impl CapsuledConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the `SQLite` database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("capsules.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Sweeper settings, in humantime notation ("1h", "30d").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperSettings {
    /// Time between sweep passes.
    #[serde(default = "default_interval")]
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// How long after its unlock time a capsule stays readable.
    #[serde(default = "default_retention")]
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
}

const fn default_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

const fn default_retention() -> Duration {
    DEFAULT_RETENTION
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            retention: default_retention(),
        }
    }
}

impl From<SweeperSettings> for SweeperConfig {
    fn from(settings: SweeperSettings) -> Self {
        Self {
            interval: settings.interval,
            retention: settings.retention,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = CapsuledConfig::from_toml("").unwrap();
        assert_eq!(config.store.path, PathBuf::from("capsules.db"));
        assert_eq!(config.sweeper.interval, DEFAULT_SWEEP_INTERVAL);
        assert_eq!(config.sweeper.retention, DEFAULT_RETENTION);
    }

    #[test]
    fn humantime_durations_parse() {
        let config = CapsuledConfig::from_toml(
            r#"
            [store]
            path = "/tmp/capsules.db"

            [sweeper]
            interval = "15m"
            retention = "7d"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/capsules.db"));
        assert_eq!(config.sweeper.interval, Duration::from_secs(15 * 60));
        assert_eq!(config.sweeper.retention, Duration::from_secs(7 * 24 * 3600));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = CapsuledConfig::from_toml("[sweeper]\ninterval = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = CapsuledConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let back = CapsuledConfig::from_toml(&rendered).unwrap();
        assert_eq!(back.sweeper.interval, config.sweeper.interval);
        assert_eq!(back.store.path, config.store.path);
    }
}
