// src/shipping/mod.rs
//! Shipping recorded days to remote storage
//!
//! - **Object Store**: "put blob under key" backends (HTTP, local directory)
//! - **Uploader**: pushes a day's record file under a partitioned key
//! - **Rotation**: moves shipped rows into the day's backup file
//!
//! # Architecture
//!
//! ```text
//! records.<day>.csv ──→ Uploader::upload() ──→ ObjectStore::put()
//!                                                   ↓ ok
//!                       records.<day>.bak.csv ←── RotationManager::archive()
//!                                                   ↓
//!                                           delete records.<day>.csv
//! ```

pub mod object_store;
pub mod rotation;
pub mod uploader;

// Re-export commonly used types
pub use object_store::{from_destination, HttpObjectStore, LocalObjectStore, ObjectStore};
pub use rotation::{ArchiveReport, RotationManager};
pub use uploader::{UploadOutcome, Uploader, UploaderConfig};
