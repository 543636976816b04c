//! Ingest progress reporting.
//!
//! `satoshi ingest` can spend minutes waiting on the embedding provider, so
//! the pipeline emits an event per phase and per embedded batch. Events go
//! to **stderr**; stdout stays reserved for the final summary.
//!
//! ```text
//! ingest  loaded 1,204 items
//! ingest  chunked into 3,911 chunks
//! ingest  embedding  640 / 3,911 chunks
//! ingest  writing 3,911 entries to ./data/satoshi.index
//! ```
//!
//! With `--progress json` the same events are one JSON object per line,
//! e.g. `{"event":"progress","phase":"embedding","done":640,"total":3911}`.

use serde::Serialize;
use std::io::{IsTerminal, Write};

/// A single progress event for an ingest run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum IngestProgressEvent {
    /// Items read from the store.
    Loaded { items: u64 },
    /// Items split into this many chunks; embedding is next.
    Chunked { chunks: u64 },
    /// `done` of `total` chunks have vectors.
    Embedding { done: u64, total: u64 },
    /// The finished index is being written.
    Writing { path: String, entries: u64 },
}

impl IngestProgressEvent {
    /// One human-readable line, without the trailing newline.
    pub fn human_line(&self) -> String {
        match self {
            IngestProgressEvent::Loaded { items } => {
                format!("ingest  loaded {} items", group_thousands(*items))
            }
            IngestProgressEvent::Chunked { chunks } => {
                format!("ingest  chunked into {} chunks", group_thousands(*chunks))
            }
            IngestProgressEvent::Embedding { done, total } => format!(
                "ingest  embedding  {} / {} chunks",
                group_thousands(*done),
                group_thousands(*total)
            ),
            IngestProgressEvent::Writing { path, entries } => format!(
                "ingest  writing {} entries to {}",
                group_thousands(*entries),
                path
            ),
        }
    }

    /// The event as a JSON object tagged `"event": "progress"`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("event".to_string(), "progress".into());
        }
        value
    }
}

/// Receives ingest progress events.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly lines on stderr.
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", event.human_line());
        let _ = stderr.flush();
    }
}

/// One JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", event.to_json());
        let _ = stderr.flush();
    }
}

pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

/// `1234567` → `1,234,567`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let lead = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && i % 3 == lead {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Where `satoshi ingest` sends progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human lines when stderr is a terminal, nothing otherwise.
    pub fn default_for_tty() -> Self {
        if std::io::stderr().is_terminal() {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(123_456), "123,456");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_human_lines() {
        assert_eq!(
            IngestProgressEvent::Embedding {
                done: 640,
                total: 3911
            }
            .human_line(),
            "ingest  embedding  640 / 3,911 chunks"
        );
        assert_eq!(
            IngestProgressEvent::Writing {
                path: "./data/satoshi.index".to_string(),
                entries: 12
            }
            .human_line(),
            "ingest  writing 12 entries to ./data/satoshi.index"
        );
    }

    #[test]
    fn test_json_event_shape() {
        let json = IngestProgressEvent::Embedding { done: 3, total: 9 }.to_json();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["phase"], "embedding");
        assert_eq!(json["done"], 3);
        assert_eq!(json["total"], 9);

        let json = IngestProgressEvent::Chunked { chunks: 4 }.to_json();
        assert_eq!(json["phase"], "chunked");
        assert_eq!(json["chunks"], 4);
    }

    struct Recorder(Mutex<Vec<IngestProgressEvent>>);

    impl IngestProgressReporter for Recorder {
        fn report(&self, event: IngestProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_reporter_is_object_safe() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let reporter: &dyn IngestProgressReporter = &recorder;
        reporter.report(IngestProgressEvent::Loaded { items: 2 });
        assert_eq!(
            recorder.0.lock().unwrap().as_slice(),
            &[IngestProgressEvent::Loaded { items: 2 }]
        );
    }
}
