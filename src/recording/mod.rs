// src/recording/mod.rs
//! Event capture and local persistence
//!
//! - **Record**: one captured event and its CSV row schema
//! - **Buffer**: lock-protected in-memory batch with a flush threshold
//! - **Flush Writer**: appends batches to the day's record file
//! - **Layout**: record, backup and remote object naming
//!
//! # Architecture
//!
//! ```text
//! Producer → RecordBuffer::append() ──[max_rows reached]──→ FlushWriter
//!                                                              ↓
//!                                              records.<YYYY-MM-DD>.csv
//! ```

pub mod buffer;
pub mod flush_writer;
pub mod layout;
pub mod record;

// Re-export commonly used types
pub use buffer::RecordBuffer;
pub use flush_writer::{read_records, FlushReport, FlushWriter};
pub use layout::{object_key, RecordLayout};
pub use record::{EventKind, EventRecord, HEADERS};
