// src/utils/mod.rs
//! Shared configuration and error types

pub mod config;
pub mod errors;

pub use config::{LogFormat, PipelineConfig, User};
pub use errors::{PipelineError, Result};
