//! Message and transcript entity structs.
//!
//! `RawMessage` is producer-owned and read-only to the pipeline. Everything
//! else in this module is derived from it during a render pass.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message record as delivered by the transport.
///
/// Producers disagree on field names, so correlation and tool-name fields
/// accept their common spellings as aliases. Anything not modelled here is
/// kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub role: String,

    /// A string, an ordered array of typed blocks, or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    /// Epoch millis in the common case; seconds and RFC 3339 strings are
    /// tolerated and resolved during normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    #[serde(
        default,
        rename = "toolCallId",
        alias = "tool_call_id",
        alias = "toolUseId",
        alias = "tool_use_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_call_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        default,
        rename = "messageId",
        alias = "message_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,

    #[serde(
        default,
        rename = "toolName",
        alias = "tool_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawMessage {
    pub fn new(role: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(Value::from(millis));
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tool_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }

    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    /// Identity used to memoize per-message work across renders.
    ///
    /// Messages without an id-like field return `None` and are never cached.
    pub fn stable_key(&self) -> Option<String> {
        if let Some(id) = self.id.as_deref().filter(|s| !s.is_empty()) {
            return Some(format!("id:{id}"));
        }
        if let Some(id) = self.message_id.as_deref().filter(|s| !s.is_empty()) {
            return Some(format!("msg:{id}"));
        }
        self.tool_call_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|id| format!("tool:{id}:{}", self.timestamp_repr()))
    }

    /// First non-empty tool-name field, if any.
    pub fn tool_name_hint(&self) -> Option<&str> {
        self.tool_name
            .as_deref()
            .or(self.name.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    fn timestamp_repr(&self) -> String {
        match &self.timestamp {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Roles after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalRole {
    User,
    Assistant,
    Tool,
    Unknown,
}

impl CanonicalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalRole::User => "user",
            CanonicalRole::Assistant => "assistant",
            CanonicalRole::Tool => "tool",
            CanonicalRole::Unknown => "unknown",
        }
    }
}

/// A message with its role and timestamp canonicalized.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub role: CanonicalRole,
    /// Epoch millis; `0` when the producer supplied none.
    pub timestamp: i64,
    pub original: RawMessage,
}

/// Single content block after ingestion.
///
/// String content becomes one `Text` block, so downstream stages only ever
/// see this shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(String),
    Thinking(String),
    Image(ImageBlock),
    ToolCall {
        name: String,
        args: Value,
        id: Option<String>,
    },
    ToolResult {
        name: Option<String>,
        text: Option<String>,
        id: Option<String>,
    },
    /// Recognized as a block but carrying nothing displayable.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// A displayable tool invocation or tool result.
///
/// A call and its result share `tool_call_id` but stay separate cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ToolCard {
    Call {
        name: String,
        args: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
    },
    Result {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
    },
}

impl ToolCard {
    pub fn name(&self) -> &str {
        match self {
            ToolCard::Call { name, .. } | ToolCard::Result { name, .. } => name,
        }
    }

    pub fn is_result(&self) -> bool {
        matches!(self, ToolCard::Result { .. })
    }
}

/// Per-message derived view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    pub text: Option<String>,
    pub thinking: Option<String>,
    pub images: Vec<ImageBlock>,
    pub tool_cards: Vec<ToolCard>,
}

impl ExtractedContent {
    /// True when nothing in the message is displayable.
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.thinking.is_none()
            && self.images.is_empty()
            && self.tool_cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_vendor_correlation_spellings() {
        let msg: RawMessage = serde_json::from_value(json!({
            "role": "toolResult",
            "tool_use_id": "toolu_1",
            "tool_name": "Bash",
            "content": "ok",
            "isError": false
        }))
        .unwrap();
        assert_eq!(msg.tool_call_id.as_deref(), Some("toolu_1"));
        assert_eq!(msg.tool_name_hint(), Some("Bash"));
        assert_eq!(msg.extra.get("isError"), Some(&json!(false)));
    }

    #[test]
    fn missing_role_defaults_to_empty() {
        let msg: RawMessage = serde_json::from_value(json!({"content": "hi"})).unwrap();
        assert_eq!(msg.role, "");
    }

    #[test]
    fn stable_key_prefers_id_then_message_id_then_tool_call() {
        let base = RawMessage::new("assistant", "x");
        assert_eq!(base.stable_key(), None);

        let with_tool = base.clone().with_tool_call_id("c1").with_timestamp(5);
        assert_eq!(with_tool.stable_key().as_deref(), Some("tool:c1:5"));

        let mut with_msg_id = with_tool.clone();
        with_msg_id.message_id = Some("m1".into());
        assert_eq!(with_msg_id.stable_key().as_deref(), Some("msg:m1"));

        let with_id = with_msg_id.with_id("a1");
        assert_eq!(with_id.stable_key().as_deref(), Some("id:a1"));
    }

    #[test]
    fn tool_card_serializes_with_kind_tag() {
        let card = ToolCard::Result {
            name: "read".into(),
            text: Some("done".into()),
            tool_call_id: None,
        };
        assert_eq!(
            serde_json::to_value(&card).unwrap(),
            json!({"kind": "result", "name": "read", "text": "done"})
        );
    }
}
