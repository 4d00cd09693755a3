// src/observability/mod.rs
//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise the level is `info`, or `debug`
//! in verbose mode.

use crate::utils::config::LogFormat;
use crate::utils::errors::{PipelineError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
pub fn init_tracing(format: LogFormat, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| PipelineError::ConfigError(format!("Failed to init tracing: {}", e)))
}
