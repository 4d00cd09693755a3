// src/shipping/rotation.rs
//! Rotation: uploaded record file -> day backup file
//!
//! Rows are re-validated on the way through. A row that no longer parses
//! is logged and skipped so one bad line cannot hold back the rest of the
//! day. The original file is removed only after the backup has been
//! written and synced; any earlier failure leaves it byte-for-byte intact.

use crate::recording::layout::RecordLayout;
use crate::recording::flush_writer::append_rows;
use crate::recording::record::EventRecord;
use crate::utils::errors::{PipelineError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a completed archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    pub backup_path: PathBuf,
    pub rows_archived: usize,
    pub rows_skipped: usize,
}

/// Moves shipped record files into their backup files
#[derive(Debug, Clone)]
pub struct RotationManager {
    layout: RecordLayout,
}

impl RotationManager {
    pub fn new(layout: RecordLayout) -> Self {
        Self { layout }
    }

    /// Append every valid row of `record_path` to its backup, then delete it
    pub fn archive(&self, record_path: &Path) -> Result<ArchiveReport> {
        let backup_path = self.layout.backup_for(record_path).ok_or_else(|| {
            PipelineError::ArchiveIo(format!(
                "{} is not a record file",
                record_path.display()
            ))
        })?;

        let (rows, rows_skipped) = read_valid_rows(record_path)?;

        append_rows(&backup_path, &rows).map_err(|e| archive_error(&backup_path, e))?;

        // Backup is durable; only now may the pending file go
        fs::remove_file(record_path).map_err(|e| archive_error(record_path, e))?;

        info!(
            "Archived {} rows from {} into {} ({} skipped)",
            rows.len(),
            record_path.display(),
            backup_path.display(),
            rows_skipped
        );

        Ok(ArchiveReport {
            backup_path,
            rows_archived: rows.len(),
            rows_skipped,
        })
    }
}

/// Parse and re-serialize every row; count the ones that fail
fn read_valid_rows(path: &Path) -> Result<(Vec<[String; 5]>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| archive_error(path, e))?;

    let mut rows = Vec::new();
    let mut skipped = 0;

    for (index, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) if e.is_io_error() => return Err(archive_error(path, e)),
            Err(e) => {
                warn!("Skipping unreadable row {} in {}: {}", index + 1, path.display(), e);
                skipped += 1;
                continue;
            }
        };

        match EventRecord::from_row(&row).and_then(|record| record.to_row()) {
            Ok(serialized) => rows.push(serialized),
            Err(e) => {
                warn!("Skipping malformed row {} in {}: {}", index + 1, path.display(), e);
                skipped += 1;
            }
        }
    }

    debug!("Read {} valid rows from {}", rows.len(), path.display());
    Ok((rows, skipped))
}

fn archive_error(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::ArchiveIo(format!("{}: {}", path.display(), e))
}

/// Size of a file, `None` when it does not exist
pub(crate) fn file_len(path: &Path) -> io::Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
