// src/recording/record.rs
//! Event record model and its CSV row schema
//!
//! The write path (`to_row`) and the read path (`from_row`) share
//! `HEADERS`, so field order can only change in one place.

use crate::utils::errors::{PipelineError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Column names, in serialized order
pub const HEADERS: [&str; 5] = ["event_kind", "key", "meta", "hostname", "timestamp"];

/// Fallback when the host name cannot be read
pub const UNKNOWN_HOST: &str = "unknown";

/// Kind of captured input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Keyboard,
    Mouse,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Keyboard => "KEYBOARD",
            EventKind::Mouse => "MOUSE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "KEYBOARD" => Ok(EventKind::Keyboard),
            "MOUSE" => Ok(EventKind::Mouse),
            "" => Err(PipelineError::InvalidRecord("event_kind is empty".to_string())),
            other => Err(PipelineError::InvalidRecord(format!(
                "unknown event_kind: {}",
                other
            ))),
        }
    }
}

/// One captured input event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_kind: EventKind,

    /// Key name or mouse button name
    pub key: String,

    /// Free-form metadata (`{"x": .., "y": ..}` for clicks, `{"vk": ..}` for keys)
    pub meta: Map<String, Value>,

    pub hostname: String,

    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Stamp an event with the current host name and UTC time
    pub fn capture(event_kind: EventKind, key: impl Into<String>, meta: Map<String, Value>) -> Self {
        Self {
            event_kind,
            key: key.into(),
            meta,
            hostname: current_hostname(),
            timestamp: Utc::now(),
        }
    }

    /// Required fields are present
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(PipelineError::InvalidRecord("key is empty".to_string()));
        }
        Ok(())
    }

    /// Serialize into `HEADERS` order
    pub fn to_row(&self) -> Result<[String; 5]> {
        let meta = serde_json::to_string(&self.meta)
            .map_err(|e| PipelineError::Serialization(format!("meta: {}", e)))?;

        Ok([
            self.event_kind.as_str().to_string(),
            self.key.clone(),
            meta,
            self.hostname.clone(),
            self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ])
    }

    /// Parse a row written by `to_row`
    pub fn from_row(row: &StringRecord) -> Result<Self> {
        if row.len() != HEADERS.len() {
            return Err(PipelineError::InvalidRecord(format!(
                "expected {} fields, found {}",
                HEADERS.len(),
                row.len()
            )));
        }

        let event_kind: EventKind = row[0].parse()?;

        let meta = match serde_json::from_str::<Value>(&row[2]) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                return Err(PipelineError::InvalidRecord(format!(
                    "meta is not an object: {}",
                    other
                )))
            }
            Err(e) => return Err(PipelineError::InvalidRecord(format!("meta: {}", e))),
        };

        let timestamp = DateTime::parse_from_rfc3339(&row[4])
            .map_err(|e| PipelineError::InvalidRecord(format!("timestamp: {}", e)))?
            .with_timezone(&Utc);

        let record = Self {
            event_kind,
            key: row[1].to_string(),
            meta,
            hostname: row[3].to_string(),
            timestamp,
        };
        record.validate()?;

        Ok(record)
    }
}

/// Host name of this machine, or `UNKNOWN_HOST`
pub fn current_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}
