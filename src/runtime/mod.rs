// src/runtime/mod.rs
//! Pipeline runtime
//!
//! - **Pipeline**: wires buffer, flush writer and uploader together and
//!   hands out the producer-side `EventSink` / `TriggerHandle`
//! - **Scheduler**: single task running flushes, interval uploads and
//!   on-demand uploads in order
//! - **Producer**: the injected event source abstraction
//! - **Stats**: counters shared by both sides
//!
//! # Architecture
//!
//! ```text
//! producer thread                         scheduler task
//!
//! EventSink::push ─→ RecordBuffer ──Flush──→ FlushWriter
//!                      (mutex)
//! TriggerHandle::fire ─────────────Upload──→ Uploader ─→ RotationManager
//!                          interval tick ──→ Uploader
//! ```

pub mod pipeline;
pub mod producer;
pub mod scheduler;
pub mod stats;

// Re-export commonly used types
pub use pipeline::{Command, EventSink, Pipeline, PipelineHandle, TriggerHandle};
pub use producer::{EventProducer, InputLine, LineProducer, NoopProducer};
pub use scheduler::SchedulerConfig;
pub use stats::{PipelineStats, StatsSnapshot};
