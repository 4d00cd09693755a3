// src/recording/flush_writer.rs
//! Flush writer: buffered records -> the day's local record file
//!
//! Files are append-only CSV with a single header row, written only when
//! the file is missing or empty. Every append starts on a line boundary:
//! a failed write is truncated away, and a torn row left by a crash is cut
//! off before the next batch lands.

use crate::recording::layout::RecordLayout;
use crate::recording::record::{EventRecord, HEADERS};
use crate::utils::errors::{PipelineError, Result};
use chrono::{NaiveDate, Utc};
use rand::seq::SliceRandom;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of a successful flush
#[derive(Debug, Clone)]
pub struct FlushReport {
    pub path: PathBuf,
    pub rows_written: usize,
    pub wrote_header: bool,
}

/// Appends record batches to per-day CSV files
#[derive(Debug, Clone)]
pub struct FlushWriter {
    layout: RecordLayout,
}

impl FlushWriter {
    pub fn new(layout: RecordLayout) -> Self {
        Self { layout }
    }

    /// Append `records` to today's (UTC) record file
    pub fn flush(&self, records: Vec<EventRecord>, shuffle: bool) -> Result<FlushReport> {
        self.flush_for(Utc::now().date_naive(), records, shuffle)
    }

    /// Append `records` to the record file of `date`
    pub fn flush_for(
        &self,
        date: NaiveDate,
        mut records: Vec<EventRecord>,
        shuffle: bool,
    ) -> Result<FlushReport> {
        let path = self.layout.records_path(date);

        if shuffle {
            records.shuffle(&mut rand::thread_rng());
        }

        // Serialize up front so a bad record cannot leave a half-written batch
        let rows = records
            .iter()
            .map(EventRecord::to_row)
            .collect::<Result<Vec<_>>>()?;

        fs::create_dir_all(self.layout.records_dir()).map_err(|e| flush_error(&path, e))?;

        let wrote_header = append_rows(&path, &rows).map_err(|e| flush_error(&path, e))?;

        debug!("Flushed {} rows to {}", rows.len(), path.display());

        Ok(FlushReport {
            path,
            rows_written: rows.len(),
            wrote_header,
        })
    }
}

/// Append `rows` to a CSV file, writing the header first if the file is empty
///
/// A torn last line left by an interrupted write is cut off before
/// appending. If this write fails, the file is truncated back to where it
/// started. Returns whether the header was written.
pub(crate) fn append_rows(path: &Path, rows: &[[String; 5]]) -> io::Result<bool> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;

    let start = complete_len(&mut file)?;
    let len = file.metadata()?.len();
    if start < len {
        warn!(
            "Dropping {} bytes of torn trailing row in {}",
            len - start,
            path.display()
        );
        file.set_len(start)?;
    }

    let wrote_header = start == 0;
    if let Err(e) = write_rows(&file, wrote_header, rows) {
        if let Err(rollback) = file.set_len(start) {
            warn!("Failed to roll back {}: {}", path.display(), rollback);
        }
        return Err(e);
    }
    Ok(wrote_header)
}

fn write_rows(file: &File, header: bool, rows: &[[String; 5]]) -> io::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if header {
        writer.write_record(HEADERS)?;
    }
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    drop(writer);

    file.sync_data()
}

/// Length of `file` up to and including its last newline
fn complete_len(file: &mut File) -> io::Result<u64> {
    let mut end = file.metadata()?.len();
    let mut chunk = [0u8; 4096];

    while end > 0 {
        let start = end.saturating_sub(chunk.len() as u64);
        let buf = &mut chunk[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(buf)?;
        if let Some(pos) = buf.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

/// Read every record back from a record or backup file
pub fn read_records(path: &Path) -> Result<Vec<EventRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PipelineError::Serialization(format!("{}: {}", path.display(), e)))?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| PipelineError::Serialization(format!("{}: {}", path.display(), e)))?;
        records.push(EventRecord::from_row(&row)?);
    }
    Ok(records)
}

fn flush_error(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::FlushIo(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::record::EventKind;
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};
    use tempfile::tempdir;

    fn record(kind: EventKind, key: &str, meta: Value) -> EventRecord {
        EventRecord::capture(kind, key, meta.as_object().cloned().unwrap_or_default())
    }

    fn sorted_keys(records: &[EventRecord]) -> Vec<String> {
        let mut keys: Vec<_> = records.iter().map(|r| r.key.clone()).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempdir().unwrap();
        let writer = FlushWriter::new(RecordLayout::new(dir.path()));
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let first = writer
            .flush_for(day, vec![record(EventKind::Keyboard, "a", json!({"vk": 65}))], false)
            .unwrap();
        assert!(first.wrote_header);

        let second = writer
            .flush_for(day, vec![record(EventKind::Keyboard, "b", json!({"vk": 66}))], false)
            .unwrap();
        assert!(!second.wrote_header);

        let content = fs::read_to_string(&first.path).unwrap();
        let header_lines = content
            .lines()
            .filter(|line| *line == "event_kind,key,meta,hostname,timestamp")
            .count();
        assert_eq!(header_lines, 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_preserves_order_without_shuffle() {
        let dir = tempdir().unwrap();
        let writer = FlushWriter::new(RecordLayout::new(dir.path()));

        let records: Vec<_> = (0..20)
            .map(|i| record(EventKind::Keyboard, &format!("k{:02}", i), json!({})))
            .collect();
        let report = writer.flush(records.clone(), false).unwrap();

        let read = read_records(&report.path).unwrap();
        assert_eq!(read, records);
    }

    #[test]
    fn test_shuffle_keeps_content() {
        let dir = tempdir().unwrap();
        let writer = FlushWriter::new(RecordLayout::new(dir.path()));

        let records: Vec<_> = (0..50)
            .map(|i| record(EventKind::Mouse, &format!("button{:02}", i), json!({"x": i, "y": i * 2})))
            .collect();
        let report = writer.flush(records.clone(), true).unwrap();
        assert_eq!(report.rows_written, 50);

        let read = read_records(&report.path).unwrap();
        assert_eq!(sorted_keys(&read), sorted_keys(&records));
        for original in &records {
            assert!(read.contains(original));
        }
    }

    #[test]
    fn test_empty_existing_file_gets_header() {
        let dir = tempdir().unwrap();
        let layout = RecordLayout::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        fs::write(layout.records_path(day), "").unwrap();

        let writer = FlushWriter::new(layout);
        let report = writer
            .flush_for(day, vec![record(EventKind::Keyboard, "x", json!({}))], false)
            .unwrap();
        assert!(report.wrote_header);
        assert_eq!(read_records(&report.path).unwrap().len(), 1);
    }

    #[test]
    fn test_torn_tail_does_not_swallow_next_flush() {
        let dir = tempdir().unwrap();
        let writer = FlushWriter::new(RecordLayout::new(dir.path()));
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let first = writer
            .flush_for(day, vec![record(EventKind::Keyboard, "a", json!({}))], false)
            .unwrap();

        // Interrupted write: half a row, no newline
        let mut file = OpenOptions::new().append(true).open(&first.path).unwrap();
        io::Write::write_all(&mut file, b"KEYBOARD,z,{}").unwrap();
        drop(file);

        let second = writer
            .flush_for(
                day,
                vec![
                    record(EventKind::Keyboard, "b", json!({})),
                    record(EventKind::Keyboard, "c", json!({})),
                ],
                false,
            )
            .unwrap();
        assert!(!second.wrote_header);

        let keys: Vec<_> = read_records(&second.path)
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(fs::read_to_string(&second.path).unwrap().ends_with('\n'));
    }

    #[test]
    fn test_torn_header_is_rewritten() {
        let dir = tempdir().unwrap();
        let layout = RecordLayout::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        fs::write(layout.records_path(day), "event_kind,ke").unwrap();

        let writer = FlushWriter::new(layout);
        let report = writer
            .flush_for(day, vec![record(EventKind::Keyboard, "x", json!({}))], false)
            .unwrap();
        assert!(report.wrote_header);
        assert_eq!(read_records(&report.path).unwrap().len(), 1);
    }

    #[test]
    fn test_complete_len_spans_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.csv");
        let mut content = "x".repeat(10).into_bytes();
        content.push(b'\n');
        content.extend(std::iter::repeat(b'y').take(9000));
        fs::write(&path, &content).unwrap();

        let mut file = File::open(&path).unwrap();
        assert_eq!(complete_len(&mut file).unwrap(), 11);
    }

    #[test]
    fn test_unwritable_directory_is_flush_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("records");
        fs::write(&blocker, "not a directory").unwrap();

        let writer = FlushWriter::new(RecordLayout::new(&blocker));
        let result = writer.flush(vec![record(EventKind::Keyboard, "a", json!({}))], false);
        assert!(matches!(result, Err(PipelineError::FlushIo(_))));
    }

    #[test]
    fn test_meta_with_commas_and_quotes() {
        let dir = tempdir().unwrap();
        let writer = FlushWriter::new(RecordLayout::new(dir.path()));

        let mut meta = Map::new();
        meta.insert("note".to_string(), json!("a, \"quoted\" value"));
        let original = EventRecord::capture(EventKind::Keyboard, ",", meta);

        let report = writer.flush(vec![original.clone()], false).unwrap();
        assert_eq!(read_records(&report.path).unwrap(), vec![original]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_flush_roundtrip_is_a_permutation(
            keys in prop::collection::vec("[a-z0-9]{1,8}", 1..40),
            shuffle in any::<bool>(),
        ) {
            let dir = tempdir().unwrap();
            let writer = FlushWriter::new(RecordLayout::new(dir.path()));

            let records: Vec<_> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| record(EventKind::Keyboard, k, json!({"vk": i})))
                .collect();

            let report = writer.flush(records.clone(), shuffle).unwrap();
            let read = read_records(&report.path).unwrap();

            prop_assert_eq!(read.len(), records.len());
            if !shuffle {
                prop_assert_eq!(&read, &records);
            }
            for original in &records {
                prop_assert!(read.contains(original));
            }
        }
    }
}
