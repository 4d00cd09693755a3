// src/recording/buffer.rs
//! In-memory record buffer
//!
//! Shared between the producer thread and the pipeline task. Append,
//! threshold check and drain all run under the same lock, so a drained
//! batch is never missing an append that raced with it.

use crate::recording::record::EventRecord;
use crate::utils::errors::Result;
use parking_lot::Mutex;
use std::mem;

/// Ordered, append-only buffer with a flush threshold
pub struct RecordBuffer {
    rows: Mutex<Vec<EventRecord>>,

    /// Rows at which `append` hands back a batch; `None` never does
    threshold: Option<usize>,
}

impl RecordBuffer {
    /// Buffer that fills up at `max_rows`
    pub fn new(max_rows: usize) -> Self {
        Self {
            rows: Mutex::new(Vec::with_capacity(max_rows.min(4096))),
            threshold: Some(max_rows.max(1)),
        }
    }

    /// Buffer that never reports itself full (dry-run)
    pub fn unbounded() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            threshold: None,
        }
    }

    /// Append a record to the tail
    ///
    /// Returns the whole drained contents when this append reached the
    /// threshold; the caller owns flushing them.
    pub fn append(&self, record: EventRecord) -> Result<Option<Vec<EventRecord>>> {
        let mut batch = None;
        self.append_with(record, |drained| batch = Some(drained))?;
        Ok(batch)
    }

    /// Append a record and hand a full buffer to `on_full` before unlocking
    ///
    /// Batches reach `on_full` in drain order even with several producers.
    /// `on_full` runs under the buffer lock and must not block.
    pub fn append_with<F>(&self, record: EventRecord, on_full: F) -> Result<()>
    where
        F: FnOnce(Vec<EventRecord>),
    {
        record.validate()?;

        let mut rows = self.rows.lock();
        rows.push(record);

        if let Some(max_rows) = self.threshold {
            if rows.len() >= max_rows {
                on_full(mem::take(&mut *rows));
            }
        }
        Ok(())
    }

    /// Current number of buffered records
    pub fn size(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Take everything, leaving the buffer empty
    pub fn drain_all(&self) -> Vec<EventRecord> {
        mem::take(&mut *self.rows.lock())
    }

    /// Copy of the current contents, in append order
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.rows.lock().clone()
    }

    pub fn threshold(&self) -> Option<usize> {
        self.threshold
    }
}
