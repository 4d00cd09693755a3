// src/shipping/uploader.rs
//! Uploader: local record file -> remote object, then rotation
//!
//! Delivery is at-least-once. A failed or timed-out upload leaves the file
//! where it is for the next attempt; a retried day may land in the store
//! more than once under different keys.

use crate::recording::layout::{object_key, RecordLayout};
use crate::shipping::object_store::ObjectStore;
use crate::shipping::rotation::{file_len, ArchiveReport, RotationManager};
use crate::utils::config::User;
use crate::utils::errors::{PipelineError, Result};
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Uploader configuration
#[derive(Debug, Clone, Default)]
pub struct UploaderConfig {
    /// Bound on a single remote write
    pub timeout: Option<Duration>,

    /// Skip all remote writes and rotation
    pub dry_run: bool,
}

/// Result of one upload attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No record file for the day
    NothingPending,

    /// Dry-run mode; nothing was sent
    DryRun,

    Uploaded {
        key: String,
        bytes: usize,
        /// `None` when the file changed after it was read and was left for the next attempt
        archive: Option<ArchiveReport>,
    },
}

/// Ships day files to the object store
pub struct Uploader {
    layout: RecordLayout,
    user: User,
    store: Arc<dyn ObjectStore>,
    rotation: RotationManager,
    config: UploaderConfig,

    /// One upload at a time; a concurrent archive would delete the file under another upload
    in_flight: Mutex<()>,
}

impl Uploader {
    pub fn new(
        layout: RecordLayout,
        user: User,
        store: Arc<dyn ObjectStore>,
        config: UploaderConfig,
    ) -> Self {
        let rotation = RotationManager::new(layout.clone());
        Self {
            layout,
            user,
            store,
            rotation,
            config,
            in_flight: Mutex::new(()),
        }
    }

    /// Upload today's (UTC) record file
    pub async fn upload_today(&self) -> Result<UploadOutcome> {
        self.upload(Utc::now().date_naive()).await
    }

    /// Upload the record file of `date` and archive it on success
    pub async fn upload(&self, date: NaiveDate) -> Result<UploadOutcome> {
        let _guard = self.in_flight.lock().await;

        let path = self.layout.records_path(date);

        let body = match tokio::fs::read(&path).await {
            Ok(body) => Bytes::from(body),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No pending records for {}", date);
                return Ok(UploadOutcome::NothingPending);
            }
            Err(e) => {
                return Err(PipelineError::Upload(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if self.config.dry_run {
            debug!("Dry run: not uploading {}", path.display());
            return Ok(UploadOutcome::DryRun);
        }

        let key = object_key(&self.user.id, Utc::now());
        let bytes = body.len();

        debug!("Uploading {} ({} bytes) as {}", path.display(), bytes, key);

        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.put(&key, body))
                .await
                .map_err(|_| PipelineError::UploadTimeout(limit.as_secs()))??,
            None => self.store.put(&key, body).await?,
        }

        info!("Uploaded {} to {} as {}", path.display(), self.store.describe(), key);

        // Rows appended after the read were not part of this object
        let current_len = file_len(&path).map_err(|e| {
            PipelineError::ArchiveIo(format!("{}: {}", path.display(), e))
        })?;
        if current_len != Some(bytes as u64) {
            warn!(
                "{} changed during upload, leaving it for the next attempt",
                path.display()
            );
            return Ok(UploadOutcome::Uploaded {
                key,
                bytes,
                archive: None,
            });
        }

        let rotation = self.rotation.clone();
        let archive_path = path.clone();
        let report = tokio::task::spawn_blocking(move || rotation.archive(&archive_path))
            .await
            .map_err(|e| PipelineError::ArchiveIo(format!("Archive task failed: {}", e)))??;

        Ok(UploadOutcome::Uploaded {
            key,
            bytes,
            archive: Some(report),
        })
    }

    /// Days with a pending record file, oldest first
    pub fn pending_dates(&self) -> Result<Vec<NaiveDate>> {
        let entries = match std::fs::read_dir(self.layout.records_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PipelineError::Upload(format!(
                    "Failed to list {}: {}",
                    self.layout.records_dir().display(),
                    e
                )))
            }
        };

        let mut dates: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| RecordLayout::record_date(&entry.path()))
            .collect();
        dates.sort();
        Ok(dates)
    }

    /// Upload every pending day, oldest first
    pub async fn upload_pending(&self) -> Vec<(NaiveDate, Result<UploadOutcome>)> {
        let dates = match self.pending_dates() {
            Ok(dates) => dates,
            Err(e) => {
                warn!("{}", e);
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(dates.len());
        for date in dates {
            let result = self.upload(date).await;
            results.push((date, result));
        }
        results
    }
}
