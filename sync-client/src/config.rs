//! Configuration loading for filesync clients.
//!
//! Configuration is loaded from a TOML file (default: `filesync.toml` in the
//! data directory). Every key is optional.

use filesync_core::{Backoff, RoundPolicy, DEFAULT_MAX_ROUNDS};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the sync orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Round budget and backoff.
    #[serde(default)]
    pub rounds: RoundsConfig,
    /// Progress reporting.
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Round configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoundsConfig {
    /// Maximum execute rounds per sync call (default: 10).
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Delay between rounds that recorded failures (default: none).
    pub backoff: Option<BackoffConfig>,
}

/// Inter-round backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffConfig {
    /// Delay after the first failing round in milliseconds (default: 200).
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    /// Upper bound on any delay in milliseconds (default: 5000).
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// Randomize each delay between zero and its bound (default: true).
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

/// Progress reporting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressConfig {
    /// Snapshots buffered per subscriber before it lags (default: 64).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

fn default_base_ms() -> u64 {
    200
}

fn default_max_ms() -> u64 {
    5_000
}

fn default_jitter() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            backoff: None,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            jitter: default_jitter(),
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if it exists, otherwise use defaults.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// The round policy these settings describe.
    pub fn round_policy(&self) -> RoundPolicy {
        let policy = RoundPolicy::new(self.rounds.max_rounds);
        match &self.rounds.backoff {
            Some(b) => policy.with_backoff(Backoff::new(
                Duration::from_millis(b.base_ms),
                Duration::from_millis(b.max_ms),
                b.jitter,
            )),
            None => policy,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_uses_defaults() {
        let config: SyncConfig = toml::from_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.rounds.max_rounds, 10);
        assert_eq!(config.progress.channel_capacity, 64);
        assert_eq!(config.round_policy(), RoundPolicy::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [rounds]
            max_rounds = 3

            [rounds.backoff]
            base_ms = 50
            max_ms = 400
            jitter = false

            [progress]
            channel_capacity = 8
        "#;

        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rounds.max_rounds, 3);
        assert_eq!(config.progress.channel_capacity, 8);

        let policy = config.round_policy();
        assert_eq!(policy.max_rounds, 3);
        assert_eq!(policy.delay_after(1), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_after(2), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_after(10), Some(Duration::from_millis(400)));
    }

    #[test]
    fn backoff_table_fills_defaults() {
        let config: SyncConfig = toml::from_str("[rounds.backoff]\njitter = false\n").unwrap();
        assert_eq!(
            config.rounds.backoff,
            Some(BackoffConfig {
                jitter: false,
                ..BackoffConfig::default()
            })
        );
        assert_eq!(config.rounds.max_rounds, 10);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<SyncConfig>("[rounds]\nmax_round = 3\n").is_err());
    }

    #[test]
    fn from_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filesync.toml");
        std::fs::write(&path, "[rounds]\nmax_rounds = \"many\"\n").unwrap();

        let err = SyncConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("filesync.toml"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            SyncConfig::from_file(&path),
            Err(ConfigError::ReadError { .. })
        ));
        assert_eq!(
            SyncConfig::from_file_or_default(&path).unwrap(),
            SyncConfig::default()
        );
    }
}
