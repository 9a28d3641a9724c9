//! Append-only metrics sink.
//!
//! No Prometheus backend to poll here, no HTTP client: this engine logs an
//! append-only, line-oriented event stream instead, the kind an operator
//! tails directly: one line per event, tab-separated, flushed immediately.
//! Built on `tracing` for structured, queryable instrumentation, plus a
//! small file sink for the literal event log.

use crate::error::{Error, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The three event kinds the append-only log distinguishes: the start of a
/// lifecycle (`START`), its end (`END`), or a point-in-time occurrence that
/// doesn't bound a lifecycle (`MARK`), e.g. a single helper reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Start,
    End,
    Mark,
}

impl EventKind {
    fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "START",
            EventKind::End => "END",
            EventKind::Mark => "MARK",
        }
    }
}

/// A single event worth recording: its kind and a free-form label carrying
/// everything else (stripe id, helper index, error reason, ...).
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub label: String,
}

impl Event {
    pub fn new(kind: EventKind, label: impl Into<String>) -> Self {
        Event {
            kind,
            label: label.into(),
        }
    }
}

/// Appends one tab-separated line per event to a file, and mirrors every
/// event through `tracing` at `info` (or `warn` for failure/timeout-flavored
/// labels).
pub struct MetricsSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl MetricsSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Internal(format!("opening metrics sink {path:?}: {e}")))?;
        Ok(MetricsSink {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn record(&self, event: Event) -> Result<()> {
        let thread_id = format!("{:?}", std::thread::current().id());
        let kind = event.kind.as_str();
        let line = format!(
            "{}\t{}\t{}\t{}\n",
            Utc::now().to_rfc3339(),
            thread_id,
            kind,
            event.label
        );

        if event.label.contains("fail") || event.label.contains("timeout") {
            warn!(label = %event.label, event = kind);
        } else {
            info!(label = %event.label, event = kind);
        }

        let mut file = self.file.lock();
        file.write_all(line.as_bytes())
            .map_err(|e| Error::Internal(format!("writing metrics sink {:?}: {e}", self.path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn appends_tab_separated_lines() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("tr-repair-metrics-test-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let sink = MetricsSink::open(&path).unwrap();
        sink.record(Event::new(EventKind::Start, "stripe=42 event=repair_started helper=3")).unwrap();
        sink.record(Event::new(EventKind::End, "stripe=42 event=repair_failed reason=timeout")).unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split('\t').count(), 4);
        assert!(lines[0].contains("START"));
        assert!(lines[0].contains("stripe=42"));
        assert!(lines[1].contains("END"));
        assert!(lines[1].contains("repair_failed"));

        let _ = std::fs::remove_file(&path);
    }
}
