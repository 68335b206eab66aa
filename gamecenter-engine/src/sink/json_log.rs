//! JSON-lines event log.
//!
//! Appends one event per line to `events-YYYY-MM-DD.jsonl`, opening a new
//! file when the local date changes.

use super::{EventSink, SinkError};
use crate::events::ClusterEvent;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Serialize)]
struct LogEntry<'a> {
    /// RFC 3339 timestamp.
    timestamp: String,
    #[serde(flatten)]
    event: &'a ClusterEvent,
}

struct OpenLog {
    date: String,
    writer: BufWriter<File>,
}

/// Append-only JSON-lines event log.
pub struct JsonEventLog {
    log_dir: PathBuf,
    current: Mutex<Option<OpenLog>>,
}

impl JsonEventLog {
    /// Create a log writing into `log_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be created.
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self, SinkError> {
        let log_dir = log_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&log_dir)?;

        Ok(Self {
            log_dir,
            current: Mutex::new(None),
        })
    }

    /// Path of the file events dated `date` (`YYYY-MM-DD`) go to.
    #[must_use]
    pub fn path_for(&self, date: &str) -> PathBuf {
        self.log_dir.join(format!("events-{date}.jsonl"))
    }

    /// Write one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn append(&self, event: &ClusterEvent) -> Result<(), SinkError> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(
            i64::try_from(event.timestamp_ms).unwrap_or(i64::MAX),
        )
        .unwrap_or_else(Utc::now);
        let today = timestamp.with_timezone(&Local).format("%Y-%m-%d").to_string();

        let mut current = self
            .current
            .lock()
            .map_err(|e| SinkError::LockPoisoned(format!("log lock: {e}")))?;

        if current.as_ref().map(|log| log.date.as_str()) != Some(today.as_str()) {
            if let Some(old) = current.as_mut() {
                old.writer.flush()?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(&today))?;
            *current = Some(OpenLog {
                date: today,
                writer: BufWriter::new(file),
            });
        }

        if let Some(log) = current.as_mut() {
            let entry = LogEntry {
                timestamp: timestamp.to_rfc3339(),
                event,
            };
            serde_json::to_writer(&mut log.writer, &entry)?;
            writeln!(log.writer)?;
            log.writer.flush()?;
        }

        Ok(())
    }
}

impl EventSink for JsonEventLog {
    fn emit(&self, event: &ClusterEvent) {
        if let Err(e) = self.append(event) {
            warn!("Failed to write event log: {e}");
        }
    }
}
