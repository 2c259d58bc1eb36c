//! Role and timestamp canonicalization.
//!
//! Every function here is total and deterministic: the same `RawMessage`
//! always normalizes to the same `NormalizedMessage`.

use serde_json::Value;

use crate::model::{CanonicalRole, NormalizedMessage, RawMessage};

/// Alternate timestamp fields consulted when `timestamp` is absent.
const TIMESTAMP_FALLBACK_FIELDS: &[&str] = &["createdAt", "created_at", "ts"];

/// Map a producer role string onto a canonical role.
///
/// Matching is case-insensitive. A tool-call-id-shaped field forces `Tool`
/// regardless of the role string.
pub fn normalize_role(role: &str, has_tool_call_id: bool) -> CanonicalRole {
    if has_tool_call_id {
        return CanonicalRole::Tool;
    }
    let lower = role.trim().to_ascii_lowercase();
    match lower.as_str() {
        "user" | "human" => CanonicalRole::User,
        "assistant" | "agent" | "model" | "bot" => CanonicalRole::Assistant,
        "tool" | "toolresult" | "tool_result" | "tool-result" | "function" => {
            CanonicalRole::Tool
        }
        _ => CanonicalRole::Unknown,
    }
}

/// Canonical role of a raw message.
pub fn role_of(message: &RawMessage) -> CanonicalRole {
    let has_id = message
        .tool_call_id
        .as_deref()
        .is_some_and(|id| !id.is_empty());
    normalize_role(&message.role, has_id)
}

/// Whether the message itself carries tool output.
pub fn is_tool_result_message(message: &RawMessage) -> bool {
    role_of(message) == CanonicalRole::Tool
}

pub fn normalize_message(message: &RawMessage) -> NormalizedMessage {
    NormalizedMessage {
        role: role_of(message),
        timestamp: normalize_timestamp(message),
        original: message.clone(),
    }
}

/// Resolve a message's timestamp to epoch millis, `0` when none is usable.
pub fn normalize_timestamp(message: &RawMessage) -> i64 {
    message
        .timestamp
        .as_ref()
        .and_then(parse_timestamp)
        .or_else(|| {
            TIMESTAMP_FALLBACK_FIELDS
                .iter()
                .filter_map(|field| message.extra.get(*field))
                .find_map(parse_timestamp)
        })
        .unwrap_or(0)
}

/// Parse a timestamp from either integer milliseconds or an ISO-8601 string.
/// Returns milliseconds since Unix epoch, or None if unparseable.
///
/// Values below 100_000_000_000 are taken as seconds.
pub fn parse_timestamp(val: &Value) -> Option<i64> {
    if let Some(ts) = val.as_i64() {
        return Some(seconds_or_millis(ts));
    }
    if let Some(f) = val.as_f64() {
        return Some(float_seconds_or_millis(f));
    }
    let s = val.as_str()?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(num) = s.parse::<i64>() {
        return Some(seconds_or_millis(num));
    }
    if let Ok(num) = s.parse::<f64>() {
        return Some(float_seconds_or_millis(num));
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    None
}

fn seconds_or_millis(ts: i64) -> i64 {
    if (0..100_000_000_000).contains(&ts) {
        ts.saturating_mul(1000)
    } else {
        ts
    }
}

fn float_seconds_or_millis(num: f64) -> i64 {
    if !num.is_finite() {
        return 0;
    }
    if (0.0..100_000_000_000.0).contains(&num) {
        (num * 1000.0).round() as i64
    } else {
        num.round() as i64
    }
}

/// Stable render key for a message at `index` in the visible history.
pub fn message_key(message: &RawMessage, index: usize) -> String {
    if let Some(id) = message.tool_call_id.as_deref().filter(|s| !s.is_empty()) {
        return format!("tool:{id}");
    }
    if let Some(id) = message.id.as_deref().filter(|s| !s.is_empty()) {
        return format!("msg:{id}");
    }
    if let Some(id) = message.message_id.as_deref().filter(|s| !s.is_empty()) {
        return format!("msg:{id}");
    }
    let role = message.role.trim().to_ascii_lowercase();
    let role = if role.is_empty() { "unknown" } else { role.as_str() };
    match normalize_timestamp(message) {
        0 => format!("msg:{role}:{index}"),
        ts => format!("msg:{role}:{ts}:{index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roles_match_case_insensitively() {
        assert_eq!(normalize_role("Assistant", false), CanonicalRole::Assistant);
        assert_eq!(normalize_role("USER", false), CanonicalRole::User);
        assert_eq!(normalize_role("  tool ", false), CanonicalRole::Tool);
    }

    #[test]
    fn vendor_tool_result_spellings_map_to_tool() {
        for role in ["toolResult", "tool_result", "ToolResult", "function"] {
            assert_eq!(normalize_role(role, false), CanonicalRole::Tool, "{role}");
        }
    }

    #[test]
    fn tool_call_id_forces_tool_role() {
        let msg = RawMessage::new("assistant", "output").with_tool_call_id("call_9");
        assert_eq!(role_of(&msg), CanonicalRole::Tool);
        assert!(is_tool_result_message(&msg));
    }

    #[test]
    fn empty_tool_call_id_is_ignored() {
        let msg = RawMessage::new("assistant", "hi").with_tool_call_id("");
        assert_eq!(role_of(&msg), CanonicalRole::Assistant);
    }

    #[test]
    fn unrecognized_roles_are_unknown() {
        assert_eq!(normalize_role("system", false), CanonicalRole::Unknown);
        assert_eq!(normalize_role("", false), CanonicalRole::Unknown);
        assert_eq!(normalize_role("🤖", false), CanonicalRole::Unknown);
    }

    #[test]
    fn timestamp_millis_seconds_and_strings() {
        assert_eq!(parse_timestamp(&json!(1_700_000_000_000_i64)), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp(&json!(1_700_000_000_i64)), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp(&json!("1700000000")), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp(&json!(1_700_000_000.5)), Some(1_700_000_000_500));
        assert!(parse_timestamp(&json!("2025-11-12T18:31:32.217Z")).unwrap() > 1_700_000_000_000);
        assert_eq!(parse_timestamp(&json!("not a time")), None);
        assert_eq!(parse_timestamp(&json!(null)), None);
        assert_eq!(parse_timestamp(&json!({"ts": 1})), None);
    }

    #[test]
    fn timestamp_falls_back_to_alternate_fields() {
        let mut msg = RawMessage::new("user", "hi");
        msg.extra.insert("createdAt".into(), json!("2024-01-15T10:30:01Z"));
        assert_eq!(normalize_timestamp(&msg), 1_705_314_601_000);
    }

    #[test]
    fn missing_timestamp_normalizes_to_zero() {
        assert_eq!(normalize_timestamp(&RawMessage::new("user", "hi")), 0);
    }

    #[test]
    fn normalization_is_idempotent() {
        let msg = RawMessage::new("toolResult", "done").with_timestamp(42);
        assert_eq!(normalize_message(&msg), normalize_message(&msg));
    }

    #[test]
    fn message_keys() {
        let tool = RawMessage::new("tool", "x").with_tool_call_id("c1");
        assert_eq!(message_key(&tool, 3), "tool:c1");
        let with_id = RawMessage::new("user", "x").with_id("u1");
        assert_eq!(message_key(&with_id, 3), "msg:u1");
        let timed = RawMessage::new("User", "x").with_timestamp(1_700_000_000_000);
        assert_eq!(message_key(&timed, 3), "msg:user:1700000000000:3");
        assert_eq!(message_key(&RawMessage::new("", "x"), 0), "msg:unknown:0");
    }
}
