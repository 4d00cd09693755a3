// src/runtime/pipeline.rs
//! Pipeline assembly and the producer-facing handles
//!
//! The producer thread only touches the record buffer. Everything that
//! hits disk or network is sent as a `Command` to the scheduler task,
//! which processes them one at a time.

use crate::recording::buffer::RecordBuffer;
use crate::recording::flush_writer::FlushWriter;
use crate::recording::layout::RecordLayout;
use crate::recording::record::{EventKind, EventRecord};
use crate::runtime::producer::EventProducer;
use crate::runtime::scheduler::{Scheduler, SchedulerConfig};
use crate::runtime::stats::{PipelineStats, StatsSnapshot};
use crate::shipping::object_store::ObjectStore;
use crate::shipping::uploader::{UploadOutcome, Uploader, UploaderConfig};
use crate::utils::config::PipelineConfig;
use crate::utils::errors::{PipelineError, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Work for the scheduler task
#[derive(Debug)]
pub enum Command {
    /// Write a drained batch to the day file
    Flush(Vec<EventRecord>),

    /// Upload today's file now; reply with the outcome if asked
    Upload(Option<oneshot::Sender<Result<UploadOutcome>>>),
}

/// State shared between the producer side and the scheduler
pub(crate) struct Shared {
    pub(crate) buffer: RecordBuffer,
    pub(crate) stats: PipelineStats,
    verbose: bool,
    commands: mpsc::UnboundedSender<Command>,
}

/// Producer-side entry point: one call per key or button press
#[derive(Clone)]
pub struct EventSink {
    shared: Arc<Shared>,
}

impl EventSink {
    /// Capture an event now; only malformed input is reported back
    pub fn push(&self, event_kind: EventKind, key: impl Into<String>, meta: Map<String, Value>) -> Result<()> {
        self.record(EventRecord::capture(event_kind, key, meta))
    }

    /// Buffer an already-stamped record
    pub fn record(&self, record: EventRecord) -> Result<()> {
        let shared = &self.shared;
        let verbose_row = shared.verbose.then(|| format!("{} {} {:?}", record.event_kind, record.key, record.meta));

        // Send under the buffer lock so batches queue in drain order
        let appended = shared.buffer.append_with(record, |batch| {
            let rows = batch.len();
            if shared.commands.send(Command::Flush(batch)).is_err() {
                warn!("Pipeline stopped, dropping {} rows", rows);
                shared.stats.rows_dropped(rows);
            }
        });
        if let Err(e) = appended {
            shared.stats.record_rejected();
            return Err(e);
        }
        shared.stats.record_captured();

        if let Some(row) = verbose_row {
            info!("Row: {} | Total: {}", row, shared.buffer.size());
        }

        Ok(())
    }

    /// Records currently waiting in memory
    pub fn buffered(&self) -> usize {
        self.shared.buffer.size()
    }
}

/// Manual upload trigger (hotkey)
#[derive(Clone)]
pub struct TriggerHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl TriggerHandle {
    /// Request one upload; `false` once the pipeline has stopped
    pub fn fire(&self) -> bool {
        self.commands.send(Command::Upload(None)).is_ok()
    }
}

/// A configured, not yet running pipeline
pub struct Pipeline {
    shared: Arc<Shared>,
    receiver: mpsc::UnboundedReceiver<Command>,
    writer: FlushWriter,
    uploader: Arc<Uploader>,
    producer: Box<dyn EventProducer>,
    scheduler: SchedulerConfig,
}

impl Pipeline {
    /// Assemble the pipeline around an object store and an event producer
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn ObjectStore>,
        producer: Box<dyn EventProducer>,
    ) -> Result<Self> {
        config.validate()?;

        let layout = RecordLayout::new(config.records_dir());
        if !config.dry_run {
            std::fs::create_dir_all(layout.records_dir()).map_err(|e| {
                PipelineError::FlushIo(format!(
                    "Failed to create {}: {}",
                    layout.records_dir().display(),
                    e
                ))
            })?;
        }

        // Dry-run captures without ever flushing
        let buffer = if config.dry_run {
            RecordBuffer::unbounded()
        } else {
            RecordBuffer::new(config.max_rows)
        };

        let (commands, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            buffer,
            stats: PipelineStats::default(),
            verbose: config.verbose,
            commands,
        });

        let uploader = Uploader::new(
            layout.clone(),
            config.user(),
            store,
            UploaderConfig {
                timeout: config.upload_timeout(),
                dry_run: config.dry_run,
            },
        );

        Ok(Self {
            shared,
            receiver,
            writer: FlushWriter::new(layout),
            uploader: Arc::new(uploader),
            producer,
            scheduler: SchedulerConfig {
                push_interval: config.push_interval(),
                shuffle: config.shuffle,
                dry_run: config.dry_run,
                catch_up: config.catch_up,
            },
        })
    }

    pub fn sink(&self) -> EventSink {
        EventSink {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn trigger(&self) -> TriggerHandle {
        TriggerHandle {
            commands: self.shared.commands.clone(),
        }
    }

    /// Start the scheduler task and the producer
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(self) -> Result<PipelineHandle> {
        let cancel = CancellationToken::new();
        let sink = self.sink();
        let trigger = self.trigger();

        let scheduler = Scheduler::new(
            self.scheduler,
            self.receiver,
            self.writer,
            Arc::clone(&self.uploader),
            Arc::clone(&self.shared),
            cancel.clone(),
        );
        let task = tokio::spawn(scheduler.run());

        let mut producer = self.producer;
        if let Err(e) = producer.start(sink.clone(), trigger.clone()) {
            error!("Failed to start event producer: {}", e);
            cancel.cancel();
            return Err(e);
        }

        info!(
            "Pipeline started (max_rows: {:?}, push_interval: {:?}, dry_run: {})",
            self.shared.buffer.threshold(),
            self.scheduler.push_interval,
            self.scheduler.dry_run
        );

        Ok(PipelineHandle {
            shared: self.shared,
            sink,
            trigger,
            producer,
            cancel,
            task: Some(task),
        })
    }
}

/// Handle to a running pipeline
pub struct PipelineHandle {
    shared: Arc<Shared>,
    sink: EventSink,
    trigger: TriggerHandle,
    producer: Box<dyn EventProducer>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    pub fn trigger(&self) -> TriggerHandle {
        self.trigger.clone()
    }

    /// Upload today's file after every command queued before this one
    pub async fn upload_now(&self) -> Result<UploadOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.shared
            .commands
            .send(Command::Upload(Some(reply)))
            .map_err(|_| PipelineError::Upload("Pipeline stopped".to_string()))?;

        outcome
            .await
            .map_err(|_| PipelineError::Upload("Pipeline stopped before replying".to_string()))?
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Token that stops the scheduler loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the producer, drain queued work, flush what is still buffered
    pub async fn shutdown(mut self) -> StatsSnapshot {
        info!("Shutting down pipeline");

        self.producer.stop();
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Scheduler task failed: {}", e);
            }
        }

        let stats = self.shared.stats.snapshot();
        info!("Pipeline stopped: {:?}", stats);
        stats
    }
}
