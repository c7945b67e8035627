//! Engine configuration parsing.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::scheduler::ScheduleConfig;
use crate::sync::RetryPolicy;

/// Configuration for the sync engine and scheduler, loadable from a TOML
/// file. Every field has a production default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the remote sink and schema source.
    pub api_url: String,
    /// Bound on every network request, in seconds.
    pub request_timeout_secs: u64,
    /// Period of the background sync, in seconds.
    pub sync_interval_secs: u64,
    /// Delay before the initial sync after startup, in seconds.
    pub startup_delay_secs: u64,
    /// Quiet period after a reconnect before syncing, in seconds.
    pub online_debounce_secs: u64,
    /// Draft autosave debounce window, in milliseconds.
    pub draft_debounce_ms: u64,
    /// Per-retry backoff schedule for failed submissions, in seconds.
    pub retry_delays_secs: Vec<u64>,
    /// Ceiling on automatic retries; past it only a manual sync retries.
    pub max_auto_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:4000".to_string(),
            request_timeout_secs: 10,
            sync_interval_secs: 120,
            startup_delay_secs: 2,
            online_debounce_secs: 3,
            draft_debounce_ms: 750,
            retry_delays_secs: vec![60, 300, 900],
            max_auto_retries: 3,
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn draft_debounce(&self) -> Duration {
        Duration::from_millis(self.draft_debounce_ms)
    }

    /// Backoff policy derived from the schedule and ceiling.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_delays_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            self.max_auto_retries,
        )
    }

    /// Scheduler timing derived from this configuration.
    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            startup_delay: Duration::from_secs(self.startup_delay_secs),
            online_debounce: Duration::from_secs(self.online_debounce_secs),
            sync_interval: Duration::from_secs(self.sync_interval_secs),
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(String, std::io::Error),
    /// TOML parse error.
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Failed to read config file '{}': {}", path, e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
