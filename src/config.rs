//! Configuration file parser for ~/.config/graze/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! `register`/`login` persist the current user by rewriting the same file.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The poll interval must be a positive number of seconds
    #[error("Invalid poll interval: {0}")]
    InvalidInterval(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Database file path. Defaults to `graze.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Seconds between scheduler ticks
    pub poll_interval_seconds: u64,

    /// Per-request timeout for feed fetches
    pub fetch_timeout_seconds: u64,

    /// The logged-in user, set by `register`/`login`
    pub current_user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            poll_interval_seconds: 60,
            fetch_timeout_seconds: 30,
            current_user: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the configuration back to `path` (used to persist `current_user`)
    pub fn store(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The scheduler's tick interval.
    ///
    /// A zero value is a configuration error, caught here before any loop starts.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidInterval(
                "poll_interval_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.poll_interval_seconds))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

// ============================================================================
// Tests
// ============================================================================
