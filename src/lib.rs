// src/lib.rs
//! Keytrail input event pipeline
//!
//! Turns a stream of key and mouse-button presses into per-day CSV record
//! files on disk, ships those files to an object store on an interval or
//! on demand, and rotates shipped rows into per-day backup files.
//!
//! # Architecture
//!
//! - **recording**: event model, in-memory buffer, flush writer, file naming
//! - **shipping**: object store backends, uploader, rotation
//! - **runtime**: pipeline assembly, scheduler task, producer abstraction
//! - **observability**: tracing setup
//! - **utils**: configuration and errors
//!
//! # Example
//!
//! ```no_run
//! use keytrail::{EventKind, NoopProducer, Pipeline, PipelineConfig};
//! use keytrail::shipping::from_destination;
//! use std::sync::Arc;
//!
//! # async fn run() -> keytrail::Result<()> {
//! let config = PipelineConfig::load()?;
//! let store = Arc::from(from_destination(&config.destination, &config.user())?);
//! let handle = Pipeline::new(&config, store, Box::new(NoopProducer))?.spawn()?;
//!
//! handle.sink().push(EventKind::Keyboard, "a", Default::default())?;
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod observability;
pub mod recording;
pub mod runtime;
pub mod shipping;
pub mod utils;

// Re-export commonly used types
pub use recording::{EventKind, EventRecord};
pub use runtime::{EventProducer, EventSink, NoopProducer, Pipeline, PipelineHandle, TriggerHandle};
pub use utils::config::PipelineConfig;
pub use utils::errors::{PipelineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
