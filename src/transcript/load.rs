//! JSONL transcript ingestion.
//!
//! Each non-empty line is one of:
//! - a raw message object (`{"role": ..., "content": ...}`),
//! - a `{"type": "message", "message": {...}}` envelope,
//! - a control event (`reading-indicator-begin`, `stream-delta`, `stream-end`).
//!
//! Lines that match none of these are skipped and counted.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::session::{ChatSession, StreamEvent};
use crate::model::RawMessage;

#[derive(Error, Debug)]
pub enum TranscriptError {
    #[error("failed to open transcript {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read transcript: {0}")]
    Read(#[from] std::io::Error),
}

/// Session rebuilt from a transcript plus what was skipped on the way.
#[derive(Debug, Clone, Default)]
pub struct LoadedTranscript {
    pub session: ChatSession,
    pub stats: LoadStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub lines: usize,
    pub messages: usize,
    pub events: usize,
    pub skipped: usize,
}

enum Line {
    Message(RawMessage),
    Event(StreamEvent),
}

const EVENT_TYPES: &[&str] = &["reading-indicator-begin", "stream-delta", "stream-end"];

fn classify(value: Value) -> Result<Line, String> {
    let Value::Object(obj) = &value else {
        return Err("line is not a JSON object".to_string());
    };
    let kind = obj.get("type").and_then(Value::as_str).map(str::to_owned);
    let looks_like_message = obj.contains_key("role") || obj.contains_key("content");

    match kind.as_deref() {
        Some("message") if obj.contains_key("message") => {
            let inner = obj.get("message").cloned().unwrap_or_default();
            serde_json::from_value(inner)
                .map(Line::Message)
                .map_err(|e| format!("invalid message: {e}"))
        }
        Some(kind) if EVENT_TYPES.contains(&kind) => serde_json::from_value(value)
            .map(Line::Event)
            .map_err(|e| format!("invalid {kind} event: {e}")),
        _ if looks_like_message => serde_json::from_value(value)
            .map(Line::Message)
            .map_err(|e| format!("invalid message: {e}")),
        _ => Err("unrecognized record".to_string()),
    }
}

/// Replay a JSONL transcript from any reader.
///
/// Only I/O failures abort; a line that is not UTF-8 is skipped like any
/// other malformed line.
pub fn read_transcript<R: BufRead>(mut reader: R) -> Result<LoadedTranscript, TranscriptError> {
    let mut loaded = LoadedTranscript::default();
    let mut buf = Vec::new();
    let mut idx = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        idx += 1;
        let decoded = std::str::from_utf8(&buf);
        if decoded.is_ok_and(|line| line.trim().is_empty()) {
            continue;
        }
        loaded.stats.lines += 1;

        let parsed = decoded
            .map_err(|e| format!("invalid UTF-8: {e}"))
            .and_then(|line| {
                serde_json::from_str::<Value>(line.trim_end()).map_err(|e| format!("invalid JSON: {e}"))
            })
            .and_then(classify);
        match parsed {
            Ok(Line::Message(message)) => {
                loaded.stats.messages += 1;
                loaded.session.push_message(message);
            }
            Ok(Line::Event(event)) => {
                loaded.stats.events += 1;
                loaded.session.apply(event);
            }
            Err(reason) => {
                loaded.stats.skipped += 1;
                warn!(
                    component = "transcript_load",
                    operation = "skip_line",
                    line = idx,
                    reason = %reason,
                    "Skipping transcript line"
                );
            }
        }
    }
    Ok(loaded)
}

/// Replay a JSONL transcript held in memory.
pub fn parse_transcript(content: &str) -> LoadedTranscript {
    // Reading from a byte slice cannot fail with an I/O error.
    read_transcript(content.as_bytes()).unwrap_or_default()
}

/// Open and replay a JSONL transcript file.
pub fn load_transcript(path: impl AsRef<Path>) -> Result<LoadedTranscript, TranscriptError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| TranscriptError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = read_transcript(BufReader::new(file))?;
    info!(
        component = "transcript_load",
        operation = "load_transcript",
        path = %path.display(),
        lines = loaded.stats.lines,
        messages = loaded.stats.messages,
        events = loaded.stats.events,
        skipped = loaded.stats.skipped,
        "Loaded transcript"
    );
    Ok(loaded)
}
