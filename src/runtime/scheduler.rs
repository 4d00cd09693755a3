// src/runtime/scheduler.rs
//! Scheduler task
//!
//! Single consumer of pipeline commands plus the upload interval timer.
//! Because flushes, timer uploads and hotkey uploads all run here in
//! turn, no two uploads overlap and no flush appends to a file while it
//! is being archived.

use crate::recording::flush_writer::FlushWriter;
use crate::recording::record::EventRecord;
use crate::runtime::pipeline::{Command, Shared};
use crate::shipping::uploader::{UploadOutcome, Uploader};
use crate::utils::errors::{PipelineError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Scheduler settings
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Time between interval uploads; the first one fires one interval after start
    pub push_interval: Duration,
    pub shuffle: bool,
    pub dry_run: bool,
    /// Interval uploads sweep every pending day instead of only today
    pub catch_up: bool,
}

/// What started an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Interval,
    OnDemand,
}

pub struct Scheduler {
    config: SchedulerConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    writer: FlushWriter,
    uploader: Arc<Uploader>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub(crate) fn new(
        config: SchedulerConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        writer: FlushWriter,
        uploader: Arc<Uploader>,
        shared: Arc<Shared>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            commands,
            writer,
            uploader,
            shared,
            cancel,
        }
    }

    /// Run until cancelled, then drain queued commands and flush leftovers
    pub async fn run(mut self) {
        let period = self.config.push_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(command) = self.commands.recv() => self.handle(command).await,

                _ = ticker.tick() => self.interval_upload().await,
            }
        }

        debug!("Scheduler stopping, draining queued commands");
        while let Ok(command) = self.commands.try_recv() {
            self.handle(command).await;
        }

        let leftover = self.shared.buffer.drain_all();
        if !leftover.is_empty() {
            if self.config.dry_run {
                debug!("Dry run: discarding {} buffered records", leftover.len());
            } else {
                info!("Flushing {} buffered records before exit", leftover.len());
                self.flush(leftover).await;
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Flush(batch) => self.flush(batch).await,
            Command::Upload(reply) => {
                let result = self.upload_today(Trigger::OnDemand).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
        }
    }

    /// Write one batch; failures drop the batch and are only logged
    async fn flush(&self, batch: Vec<EventRecord>) {
        let rows = batch.len();
        let writer = self.writer.clone();
        let shuffle = self.config.shuffle;

        let result = tokio::task::spawn_blocking(move || writer.flush(batch, shuffle))
            .await
            .map_err(|e| PipelineError::FlushIo(format!("Flush task failed: {}", e)))
            .and_then(|result| result);

        match result {
            Ok(report) => {
                debug!("Flushed {} rows to {}", report.rows_written, report.path.display());
                self.shared.stats.flush_succeeded(report.rows_written);
            }
            Err(e) => {
                error!("Dropping {} rows: {}", rows, e);
                self.shared.stats.flush_failed(rows);
            }
        }
    }

    async fn interval_upload(&self) {
        if !self.config.catch_up {
            let _ = self.upload_today(Trigger::Interval).await;
            return;
        }

        for (date, result) in self.uploader.upload_pending().await {
            debug!("Catch-up upload for {}", date);
            self.observe(Trigger::Interval, &result);
        }
    }

    async fn upload_today(&self, trigger: Trigger) -> Result<UploadOutcome> {
        let result = self.uploader.upload_today().await;
        self.observe(trigger, &result);
        result
    }

    /// Log and count an upload result; never propagates
    fn observe(&self, trigger: Trigger, result: &Result<UploadOutcome>) {
        let stats = &self.shared.stats;
        match result {
            Ok(UploadOutcome::Uploaded { key, archive, .. }) => {
                let (archived, skipped) = archive
                    .as_ref()
                    .map(|a| (a.rows_archived, a.rows_skipped))
                    .unwrap_or((0, 0));
                stats.upload_succeeded(archived, skipped);
                info!("{:?} upload stored {}", trigger, key);
            }
            Ok(UploadOutcome::NothingPending) | Ok(UploadOutcome::DryRun) => {
                stats.upload_skipped();
                debug!("{:?} upload: nothing to send", trigger);
            }
            Err(e) if e.is_retryable() => {
                stats.upload_failed();
                warn!("{:?} upload failed, will retry on next tick: {}", trigger, e);
            }
            Err(e) => {
                stats.upload_failed();
                error!("{:?} upload failed: {}", trigger, e);
            }
        }
    }
}
