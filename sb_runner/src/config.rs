//! Runner configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::path::{Path, PathBuf};

/// Complete runner configuration loaded from CLI flags and environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Competition file: bracket format plus roster
    pub format: Option<PathBuf>,
    /// Snapshot to resume from and save to
    pub snapshot: Option<PathBuf>,
    /// Seed for lane draws and simulated finishes; random when unset
    pub seed: Option<u64>,
    /// Ride every startable heat with a random finish order
    pub simulate: bool,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub format: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub seed: Option<u64>,
    pub simulate: Option<bool>,
}

/// Snapshot encoding, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Binary,
}

impl SnapshotFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SnapshotFormat::Json,
            _ => SnapshotFormat::Binary,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `overrides` - Values from CLI args
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let format = overrides
            .format
            .or_else(|| std::env::var("SB_FORMAT").ok().map(PathBuf::from));
        let snapshot = overrides
            .snapshot
            .or_else(|| std::env::var("SB_SNAPSHOT").ok().map(PathBuf::from));

        let seed = match overrides.seed {
            Some(seed) => Some(seed),
            None => match std::env::var("SB_SEED") {
                Ok(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                    var: "SB_SEED".to_string(),
                    reason: format!("'{value}' is not an unsigned integer"),
                })?),
                Err(_) => None,
            },
        };

        let simulate = overrides
            .simulate
            .unwrap_or_else(|| parse_env_or("SB_SIMULATE", true));

        Ok(RunnerConfig {
            format,
            snapshot,
            seed,
            simulate,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.format, &self.snapshot) {
            (None, None) => Err(ConfigError::MissingRequired {
                var: "SB_FORMAT".to_string(),
                hint: "Pass --format FILE, or --snapshot FILE to resume".to_string(),
            }),
            (None, Some(snapshot)) if !snapshot.exists() => Err(ConfigError::Invalid {
                var: "SB_SNAPSHOT".to_string(),
                reason: format!(
                    "{} does not exist and no format file was given",
                    snapshot.display()
                ),
            }),
            _ => Ok(()),
        }
    }

    /// Resume from the snapshot when it is already on disk.
    pub fn resume_from(&self) -> Option<&Path> {
        self.snapshot.as_deref().filter(|path| path.exists())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
