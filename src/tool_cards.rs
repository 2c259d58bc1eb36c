//! Tool card status inference and formatting.
//!
//! Status and error summaries are inferred from unstructured tool output:
//! structured JSON first, then substring heuristics. JSON parse failures fall
//! through to plain-text handling; nothing here returns an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Appended once when a preview was cut short.
pub const ELLIPSIS: &str = "…";

const GENERIC_ERROR_MESSAGE: &str = "Command failed";

const ERROR_MARKERS: &[&str] = &[
    "\"status\": \"error\"",
    "\"error\":",
    "error:",
    "failed",
    "exception",
];

const WARNING_MARKERS: &[&str] = &[
    "\"status\": \"warning\"",
    "\"warning\":",
    "warning:",
    "deprecated",
];

const SHELL_FAILURE_PHRASES: &[&str] = &["no matches found", "command not found", "No such file"];

static ERROR_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[Ee]rror:\s*(.+?)\s*$").expect("valid error-prefix regex"));

static EXIT_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:command\s+)?exit(?:ed)?(?:\s+with)?\s+(?:code|status)\s*[:=]?\s*(-?\d+)(?:[\s:.\-]+(.+))?",
    )
    .expect("valid exit-code regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
    Warning,
    Info,
}

impl ToolStatus {
    pub fn css_class(&self) -> &'static str {
        match self {
            ToolStatus::Success => "tool-status-success",
            ToolStatus::Error => "tool-status-error",
            ToolStatus::Warning => "tool-status-warning",
            ToolStatus::Info => "tool-status-info",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolStatus::Success => "success",
            ToolStatus::Error => "error",
            ToolStatus::Warning => "warning",
            ToolStatus::Info => "info",
        }
    }

    /// Map a producer `status` value onto a display status.
    pub fn from_reported(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "error" | "failed" | "failure" | "fail" => ToolStatus::Error,
            "warning" | "warn" | "deprecated" => ToolStatus::Warning,
            "success" | "ok" | "completed" | "complete" | "done" => ToolStatus::Success,
            _ => ToolStatus::Info,
        }
    }
}

/// Inferred status plus the message that accompanies it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusInfo {
    pub status: ToolStatus,
    pub message: Option<String>,
}

impl StatusInfo {
    fn bare(status: ToolStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }
}

fn parse_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

fn json_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Infer a display status from a tool result payload. First match wins:
///
/// 1. JSON with a `status` field
/// 2. error substrings
/// 3. warning substrings
/// 4. `Success` when text is present, `Info` when absent
pub fn infer_status(text: Option<&str>) -> StatusInfo {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return StatusInfo::bare(ToolStatus::Info);
    };

    if let Some(json) = parse_json(text)
        && let Some(status) = json.get("status").and_then(Value::as_str)
    {
        return StatusInfo {
            status: ToolStatus::from_reported(status),
            message: json_str(&json, "message")
                .or_else(|| json_str(&json, "error"))
                .map(String::from),
        };
    }

    let lower = text.to_lowercase();
    if ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
        return StatusInfo {
            status: ToolStatus::Error,
            message: extract_error_message(text),
        };
    }
    if WARNING_MARKERS.iter().any(|m| lower.contains(m)) {
        return StatusInfo::bare(ToolStatus::Warning);
    }
    StatusInfo::bare(ToolStatus::Success)
}

/// Pull a compact error description out of tool output.
///
/// Returns `None` when the text does not read as an error, even if
/// [`infer_status`] flagged it.
pub fn extract_error_message(text: &str) -> Option<String> {
    if let Some(json) = parse_json(text) {
        if let Some(message) = json_error_message(&json) {
            return Some(message);
        }
        if json
            .get("status")
            .and_then(Value::as_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("error"))
        {
            return Some(GENERIC_ERROR_MESSAGE.to_string());
        }
    }

    if let Some(caps) = ERROR_PREFIX_RE.captures(text)
        && let Some(m) = caps.get(1)
    {
        return Some(m.as_str().to_string());
    }

    if let Some(caps) = EXIT_CODE_RE.captures(text) {
        let code = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if code != "0" {
            let detail = caps
                .get(2)
                .map(|m| m.as_str().trim())
                .filter(|d| !d.is_empty());
            return Some(match detail {
                Some(detail) => format!("Exit code {code}: {detail}"),
                None => format!("Exit code {code}"),
            });
        }
    }

    SHELL_FAILURE_PHRASES.iter().find_map(|phrase| {
        text.lines()
            .find(|line| line.contains(phrase))
            .map(|line| line.trim().to_string())
    })
}

fn json_error_message(json: &Value) -> Option<String> {
    match json.get("error") {
        Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
        Some(obj @ Value::Object(_)) => {
            if let Some(message) = json_str(obj, "message") {
                return Some(message.to_string());
            }
        }
        _ => {}
    }
    let flagged = json.get("error").is_some_and(|e| match e {
        Value::Bool(b) => *b,
        Value::Null => false,
        _ => true,
    }) || json
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|s| ToolStatus::from_reported(s) == ToolStatus::Error);
    if flagged {
        return json_str(json, "message").map(String::from);
    }
    None
}

/// Full-display formatting of a tool payload as markdown.
///
/// JSON errors collapse to a single `**Error:**` line, other JSON is
/// pretty-printed in a fenced block, plain text passes through.
pub fn format_tool_output(text: &str) -> String {
    let Some(json) = parse_json(text) else {
        return text.to_string();
    };
    let status = infer_status(Some(text));
    if status.status == ToolStatus::Error {
        let message = extract_error_message(text)
            .or(status.message)
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());
        return format!("**Error:** {message}");
    }
    match serde_json::to_string_pretty(&json) {
        Ok(pretty) => format!("```json\n{pretty}\n```"),
        Err(_) => text.to_string(),
    }
}

/// Format structured call arguments for display.
pub fn format_args(args: &Value) -> Option<String> {
    match args {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(map) if map.is_empty() => None,
        other => serde_json::to_string_pretty(other).ok(),
    }
}

/// One-line summary of call arguments: `key: value` pairs for scalar fields.
pub fn summarize_args(args: &Value) -> Option<String> {
    match args {
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some(format!("{k}: {s}")),
                    Value::Number(n) => Some(format!("{k}: {n}")),
                    Value::Bool(b) => Some(format!("{k}: {b}")),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Preview capped at `max_lines` lines and `max_chars` characters.
///
/// The ellipsis marker is appended exactly once when either limit cut the
/// text; the returned length excluding the marker never exceeds `max_chars`.
pub fn truncated_preview(text: &str, max_lines: usize, max_chars: usize) -> String {
    let mut truncated = false;
    let mut preview = String::new();
    for (idx, line) in text.lines().enumerate() {
        if idx >= max_lines {
            truncated = true;
            break;
        }
        if idx > 0 {
            preview.push('\n');
        }
        preview.push_str(line);
    }

    if preview.chars().count() > max_chars {
        preview = preview.chars().take(max_chars).collect();
        truncated = true;
    }

    if truncated {
        let trimmed_len = preview.trim_end().len();
        preview.truncate(trimmed_len);
        preview.push_str(ELLIPSIS);
    }
    preview
}
