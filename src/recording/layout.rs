// src/recording/layout.rs
//! File and object naming
//!
//! ```text
//! <records_dir>/records.2024-03-01.csv        pending rows
//! <records_dir>/records.2024-03-01.bak.csv    shipped rows
//! records/2024-03/<user_id>/records.<upload timestamp>.csv   remote key
//! ```

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

const PREFIX: &str = "records.";
const RECORD_SUFFIX: &str = ".csv";
const BACKUP_SUFFIX: &str = ".bak.csv";

/// Deterministic naming for one records directory
#[derive(Debug, Clone)]
pub struct RecordLayout {
    records_dir: PathBuf,
}

impl RecordLayout {
    pub fn new(records_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
        }
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    /// Pending record file for a UTC day
    pub fn records_path(&self, date: NaiveDate) -> PathBuf {
        self.records_dir
            .join(format!("{}{}{}", PREFIX, date.format("%Y-%m-%d"), RECORD_SUFFIX))
    }

    /// Backup (shipped) file for a UTC day
    pub fn backup_path(&self, date: NaiveDate) -> PathBuf {
        self.records_dir
            .join(format!("{}{}{}", PREFIX, date.format("%Y-%m-%d"), BACKUP_SUFFIX))
    }

    /// Day encoded in a pending record file name; `None` for backups and strangers
    pub fn record_date(path: &Path) -> Option<NaiveDate> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(BACKUP_SUFFIX) {
            return None;
        }
        let date = name.strip_prefix(PREFIX)?.strip_suffix(RECORD_SUFFIX)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }

    /// Backup file matching a pending record file
    pub fn backup_for(&self, record_path: &Path) -> Option<PathBuf> {
        Self::record_date(record_path).map(|date| {
            let dir = record_path.parent().unwrap_or(&self.records_dir);
            dir.join(format!("{}{}{}", PREFIX, date.format("%Y-%m-%d"), BACKUP_SUFFIX))
        })
    }
}

/// Remote key for an upload attempted at `now`
///
/// The timestamp is the attempt time, so repeated uploads of the same day
/// never collide.
pub fn object_key(user_id: &str, now: DateTime<Utc>) -> String {
    format!(
        "records/{}/{}/{}{}{}",
        now.format("%Y-%m"),
        user_id,
        PREFIX,
        now.to_rfc3339_opts(SecondsFormat::Micros, true),
        RECORD_SUFFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_paths() {
        let layout = RecordLayout::new("/data/records");
        assert_eq!(
            layout.records_path(day()),
            PathBuf::from("/data/records/records.2024-03-01.csv")
        );
        assert_eq!(
            layout.backup_path(day()),
            PathBuf::from("/data/records/records.2024-03-01.bak.csv")
        );
    }

    #[test]
    fn test_record_date() {
        let layout = RecordLayout::new("/data/records");
        assert_eq!(RecordLayout::record_date(&layout.records_path(day())), Some(day()));
        assert_eq!(RecordLayout::record_date(&layout.backup_path(day())), None);
        assert_eq!(RecordLayout::record_date(Path::new("/data/records/notes.txt")), None);
        assert_eq!(
            RecordLayout::record_date(Path::new("/data/records/records.2024-13-40.csv")),
            None
        );
    }

    #[test]
    fn test_backup_for() {
        let layout = RecordLayout::new("/data/records");
        let backup = layout.backup_for(&layout.records_path(day())).unwrap();
        assert_eq!(backup, layout.backup_path(day()));
    }

    #[test]
    fn test_object_key() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 5).unwrap();
        assert_eq!(
            object_key("U123", now),
            "records/2024-03/U123/records.2024-03-01T08:30:05.000000Z.csv"
        );
    }
}
