// src/runtime/stats.rs
//! Pipeline counters
//!
//! Updated with relaxed atomics from both the producer thread and the
//! scheduler task; read as a point-in-time snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters
#[derive(Debug, Default)]
pub struct PipelineStats {
    records_captured: AtomicU64,
    records_rejected: AtomicU64,
    flushes: AtomicU64,
    flushes_failed: AtomicU64,
    rows_written: AtomicU64,
    rows_dropped: AtomicU64,
    uploads_succeeded: AtomicU64,
    uploads_failed: AtomicU64,
    uploads_skipped: AtomicU64,
    rows_archived: AtomicU64,
    rows_skipped: AtomicU64,
}

impl PipelineStats {
    pub fn record_captured(&self) {
        self.records_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flush_succeeded(&self, rows: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn flush_failed(&self, rows: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushes_failed.fetch_add(1, Ordering::Relaxed);
        self.rows_dropped.fetch_add(rows as u64, Ordering::Relaxed);
    }

    /// Rows lost without a flush attempt (pipeline already stopped)
    pub fn rows_dropped(&self, rows: usize) {
        self.rows_dropped.fetch_add(rows as u64, Ordering::Relaxed);
    }

    pub fn upload_succeeded(&self, rows_archived: usize, rows_skipped: usize) {
        self.uploads_succeeded.fetch_add(1, Ordering::Relaxed);
        self.rows_archived.fetch_add(rows_archived as u64, Ordering::Relaxed);
        self.rows_skipped.fetch_add(rows_skipped as u64, Ordering::Relaxed);
    }

    pub fn upload_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload_skipped(&self) {
        self.uploads_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_captured: self.records_captured.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushes_failed: self.flushes_failed.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_dropped: self.rows_dropped.load(Ordering::Relaxed),
            uploads_succeeded: self.uploads_succeeded.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            uploads_skipped: self.uploads_skipped.load(Ordering::Relaxed),
            rows_archived: self.rows_archived.load(Ordering::Relaxed),
            rows_skipped: self.rows_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `PipelineStats`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub records_captured: u64,
    pub records_rejected: u64,
    pub flushes: u64,
    pub flushes_failed: u64,
    pub rows_written: u64,
    pub rows_dropped: u64,
    pub uploads_succeeded: u64,
    pub uploads_failed: u64,
    pub uploads_skipped: u64,
    pub rows_archived: u64,
    pub rows_skipped: u64,
}

impl StatsSnapshot {
    /// Share of flushed rows that were lost to write failures
    pub fn drop_rate(&self) -> f64 {
        let attempted = self.rows_written + self.rows_dropped;
        if attempted == 0 {
            0.0
        } else {
            (self.rows_dropped as f64 / attempted as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = PipelineStats::default();
        stats.record_captured();
        stats.record_captured();
        stats.record_rejected();
        stats.flush_succeeded(3);
        stats.flush_failed(1);
        stats.upload_succeeded(3, 0);
        stats.upload_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.records_captured, 2);
        assert_eq!(snapshot.records_rejected, 1);
        assert_eq!(snapshot.flushes, 2);
        assert_eq!(snapshot.flushes_failed, 1);
        assert_eq!(snapshot.rows_written, 3);
        assert_eq!(snapshot.rows_dropped, 1);
        assert_eq!(snapshot.uploads_succeeded, 1);
        assert_eq!(snapshot.uploads_failed, 1);
        assert_eq!(snapshot.rows_archived, 3);
    }

    #[test]
    fn test_drop_rate() {
        let snapshot = StatsSnapshot {
            rows_written: 75,
            rows_dropped: 25,
            ..Default::default()
        };
        assert!((snapshot.drop_rate() - 25.0).abs() < f64::EPSILON);
        assert_eq!(StatsSnapshot::default().drop_rate(), 0.0);
    }
}
