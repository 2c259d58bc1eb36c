use std::io::Write as _;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tempfile::NamedTempFile;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A short session exercising every line kind the loader accepts.
#[allow(dead_code)]
pub fn sample_lines() -> Vec<Value> {
    vec![
        json!({"role": "user", "content": "Show me the config", "timestamp": 1_700_000_000_000_i64}),
        json!({"type": "message", "message": {
            "role": "assistant",
            "timestamp": 1_700_000_001_000_i64,
            "content": [
                {"type": "thinking", "thinking": "read the file first"},
                {"type": "text", "text": "Reading it now."},
                {"type": "toolCall", "id": "call_1", "name": "read", "arguments": "{\"path\":\"config.toml\"}"}
            ]
        }}),
        json!({"role": "toolResult", "toolCallId": "call_1", "toolName": "read", "content": "history_limit = 50"}),
        json!({"role": "Assistant", "content": "Here it is:\n\n```toml\nhistory_limit = 50\n```"}),
        json!({"type": "reading-indicator-begin"}),
        json!({"type": "stream-delta", "text": "Anything **else**?", "startedAt": 1_700_000_009_000_i64}),
    ]
}

/// Write JSONL lines to a temp file that lives as long as the handle.
#[allow(dead_code)]
pub fn write_jsonl(lines: &[Value]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp transcript");
    for line in lines {
        writeln!(file, "{line}").expect("write transcript line");
    }
    file.flush().expect("flush transcript");
    file
}
