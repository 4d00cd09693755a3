// src/runtime/producer.rs
//! Event producers
//!
//! The OS-level input hook lives outside this crate. Whatever owns it
//! implements `EventProducer`: it is handed an `EventSink` for key and
//! button presses and a `TriggerHandle` for the manual upload hotkey, and
//! delivers from its own thread.

use crate::recording::record::EventKind;
use crate::runtime::pipeline::{EventSink, TriggerHandle};
use crate::utils::errors::{PipelineError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Source of input events injected into the pipeline
pub trait EventProducer: Send {
    /// Begin delivering; returns once delivery is running
    fn start(&mut self, sink: EventSink, trigger: TriggerHandle) -> Result<()>;

    /// Stop delivering. Events already pushed stay in the pipeline.
    fn stop(&mut self);
}

/// Producer for hosts that push through `EventSink` directly
#[derive(Debug, Default)]
pub struct NoopProducer;

impl EventProducer for NoopProducer {
    fn start(&mut self, _sink: EventSink, _trigger: TriggerHandle) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}

/// One line of hook-helper output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputLine {
    Event {
        event_kind: EventKind,
        key: String,
        #[serde(default)]
        meta: Map<String, Value>,
        /// Releases are reported by some hooks; only presses are recorded
        #[serde(default = "default_pressed")]
        pressed: bool,
    },
    /// Manual upload hotkey
    Upload,
}

fn default_pressed() -> bool {
    true
}

impl InputLine {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| PipelineError::ProducerFailed(format!("Bad input line: {}", e)))
    }
}

/// Reads newline-delimited JSON events from a reader (usually stdin)
///
/// ```text
/// {"type":"event","event_kind":"KEYBOARD","key":"a","meta":{"vk":65}}
/// {"type":"event","event_kind":"MOUSE","key":"left","meta":{"x":10,"y":20}}
/// {"type":"upload"}
/// ```
pub struct LineProducer<R> {
    reader: Option<R>,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<R: BufRead + Send + 'static> LineProducer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            stopped: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl<R: BufRead + Send + 'static> EventProducer for LineProducer<R> {
    fn start(&mut self, sink: EventSink, trigger: TriggerHandle) -> Result<()> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| PipelineError::ProducerFailed("Producer already started".to_string()))?;
        let stopped = Arc::clone(&self.stopped);

        let handle = thread::Builder::new()
            .name("keytrail-producer".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    if stopped.load(Ordering::Relaxed) {
                        break;
                    }
                    match line {
                        Ok(line) if line.trim().is_empty() => continue,
                        Ok(line) => deliver(&line, &sink, &trigger),
                        Err(e) => {
                            warn!("Input read error: {}", e);
                            break;
                        }
                    }
                }
                debug!("Producer input closed");
            })
            .map_err(|e| PipelineError::ProducerFailed(format!("Failed to spawn reader: {}", e)))?;

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Relaxed);

        // A blocked read only notices on its next line; leave it detached
        match self.handle.take() {
            Some(handle) if handle.is_finished() => {
                if handle.join().is_err() {
                    warn!("Producer thread panicked");
                }
            }
            Some(_) => debug!("Producer still blocked on input, detaching"),
            None => {}
        }
    }
}

fn deliver(line: &str, sink: &EventSink, trigger: &TriggerHandle) {
    match InputLine::parse(line) {
        Ok(InputLine::Event {
            event_kind,
            key,
            meta,
            pressed,
        }) => {
            if !pressed {
                return;
            }
            if let Err(e) = sink.push(event_kind, key, meta) {
                warn!("Rejected event: {}", e);
            }
        }
        Ok(InputLine::Upload) => {
            if !trigger.fire() {
                warn!("Upload trigger ignored, pipeline stopped");
            }
        }
        Err(e) => warn!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event() {
        let line = r#"{"type":"event","event_kind":"MOUSE","key":"left","meta":{"x":10,"y":20}}"#;
        match InputLine::parse(line).unwrap() {
            InputLine::Event {
                event_kind,
                key,
                meta,
                pressed,
            } => {
                assert_eq!(event_kind, EventKind::Mouse);
                assert_eq!(key, "left");
                assert_eq!(meta["x"], 10);
                assert!(pressed);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_release_and_upload() {
        let release = r#"{"type":"event","event_kind":"KEYBOARD","key":"a","pressed":false}"#;
        assert!(matches!(
            InputLine::parse(release).unwrap(),
            InputLine::Event { pressed: false, .. }
        ));

        assert_eq!(InputLine::parse(r#"{"type":"upload"}"#).unwrap(), InputLine::Upload);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(InputLine::parse("not json").is_err());
        assert!(InputLine::parse(r#"{"type":"event","event_kind":"TOUCH","key":"a"}"#).is_err());
    }
}
