// src/utils/errors.rs
//! Pipeline error taxonomy
//!
//! Only `InvalidRecord` is meant to reach the event producer. Everything
//! else is recovered inside the pipeline: logged, counted, and retried by
//! the next scheduled tick where that makes sense.

use thiserror::Error;

/// Errors raised by the buffering, flush and upload pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed event rejected at the buffer boundary
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Local record file could not be written
    #[error("Flush failed: {0}")]
    FlushIo(String),

    /// Remote store rejected or never received the object
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Remote call exceeded the configured timeout
    #[error("Upload timed out after {0}s")]
    UploadTimeout(u64),

    /// Record file could not be moved into its backup file
    #[error("Archive failed: {0}")]
    ArchiveIo(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Event producer failed: {0}")]
    ProducerFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    /// Whether the failure leaves pending data in place for a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Upload(_) | PipelineError::UploadTimeout(_) | PipelineError::ArchiveIo(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
