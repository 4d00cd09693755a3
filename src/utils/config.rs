// src/utils/config.rs
//! Pipeline configuration
//!
//! Layered with the `config` crate: struct defaults, then an optional
//! TOML/YAML/JSON file, then `KEYTRAIL_*` environment variables. The binary
//! applies its command-line overrides on top of the loaded value.

use crate::utils::errors::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix (`KEYTRAIL_MAX_ROWS=50`, ...)
pub const ENV_PREFIX: &str = "KEYTRAIL";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Identity that partitions remote object keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub api_key: Option<String>,
}

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upload target: `http://host[:port]/bucket`, `file:///dir` or a directory path
    pub destination: String,

    /// User id used in the remote key partition
    pub user_id: String,

    /// Sent as `x-api-key` by the HTTP store
    pub api_key: Option<String>,

    /// Base directory; records live in `<home_dir>/records`
    pub home_dir: Option<PathBuf>,

    /// Log every captured record
    pub verbose: bool,

    /// Capture only; no disk or network writes
    pub dry_run: bool,

    /// Randomize row order at flush
    pub shuffle: bool,

    /// Flush threshold (rows)
    pub max_rows: usize,

    /// Upload cadence (seconds)
    pub push_interval: u64,

    /// Bound on a single remote write (seconds)
    pub upload_timeout_secs: Option<u64>,

    /// Upload every pending day on each tick, not just today
    pub catch_up: bool,

    pub log_format: LogFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            destination: "http://127.0.0.1:9000/keytrail-dev-bucket".to_string(),
            user_id: "U000000000000".to_string(),
            api_key: None,
            home_dir: None,
            verbose: false,
            dry_run: false,
            shuffle: true,
            max_rows: 100,
            push_interval: 60 * 30,
            upload_timeout_secs: None,
            catch_up: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl PipelineConfig {
    /// Load from defaults and `KEYTRAIL_*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from defaults, an optional config file, and the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| PipelineError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| PipelineError::ConfigError(format!("Invalid config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate option ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_rows == 0 {
            return Err(PipelineError::ConfigError(
                "max_rows must be at least 1".to_string(),
            ));
        }
        if self.push_interval == 0 {
            return Err(PipelineError::ConfigError(
                "push_interval must be at least 1 second".to_string(),
            ));
        }
        if self.destination.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "destination cannot be empty".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "user_id cannot be empty".to_string(),
            ));
        }
        // The id is a path segment of every object key
        let unreserved = self
            .user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
        if !unreserved || self.user_id == "." || self.user_id == ".." {
            return Err(PipelineError::ConfigError(format!(
                "user_id {:?} may only contain letters, digits, '-', '_', '.' and '~'",
                self.user_id
            )));
        }
        if self.upload_timeout_secs == Some(0) {
            return Err(PipelineError::ConfigError(
                "upload_timeout_secs must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    pub fn user(&self) -> User {
        User {
            id: self.user_id.clone(),
            api_key: self.api_key.clone(),
        }
    }

    /// Resolved base directory (`~/keytrail` unless configured)
    pub fn home_dir(&self) -> PathBuf {
        match &self.home_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("keytrail"),
        }
    }

    pub fn records_dir(&self) -> PathBuf {
        self.home_dir().join("records")
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_secs(self.push_interval)
    }

    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout_secs.map(Duration::from_secs)
    }
}
