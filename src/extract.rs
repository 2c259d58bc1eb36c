//! Content extraction: one raw message in, typed sub-content out.
//!
//! Handles:
//! - Direct string content
//! - Arrays of typed blocks: `text`, `thinking`, `image` / `image_url`,
//!   tool calls (`toolCall`, `tool_use`, ... or any block with both `name`
//!   and `arguments`) and tool results (`toolResult`, `tool_result`)
//! - Inline `<think>` / `<thinking>` spans inside assistant text
//!
//! Malformed blocks degrade to nothing; extraction never fails.

use std::num::NonZeroUsize;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lru::LruCache;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::model::{
    CanonicalRole, ContentBlock, ExtractedContent, ImageBlock, RawMessage, ToolCard,
};
use crate::normalize::{is_tool_result_message, role_of};

const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/png";
const FALLBACK_TOOL_NAME: &str = "tool";

static THINK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<\s*(think|thinking)\s*>(.*?)<\s*/\s*(?:think|thinking)\s*>")
        .expect("valid think-tag regex")
});

/// Normalize message content into a single ordered block list.
pub fn content_blocks(message: &RawMessage) -> Vec<ContentBlock> {
    match &message.content {
        Some(Value::String(s)) => vec![ContentBlock::Text(s.clone())],
        Some(Value::Array(items)) => items.iter().map(parse_block).collect(),
        Some(obj @ Value::Object(_)) => vec![parse_block(obj)],
        _ => Vec::new(),
    }
}

/// Classify one content block.
pub fn parse_block(item: &Value) -> ContentBlock {
    if let Some(text) = item.as_str() {
        return ContentBlock::Text(text.to_string());
    }
    let Some(obj) = item.as_object() else {
        return ContentBlock::Other;
    };
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_ascii_lowercase();

    match kind.as_str() {
        "text" | "input_text" | "output_text" => str_field(item, &["text"])
            .map(|t| ContentBlock::Text(t.to_string()))
            .unwrap_or(ContentBlock::Other),
        "thinking" | "reasoning" => str_field(item, &["thinking", "text"])
            .map(|t| ContentBlock::Thinking(t.to_string()))
            .unwrap_or(ContentBlock::Other),
        "image" | "image_url" | "input_image" => parse_image(item)
            .map(ContentBlock::Image)
            .unwrap_or(ContentBlock::Other),
        "toolcall" | "tool_call" | "tooluse" | "tool_use" | "functioncall" | "function_call" => {
            parse_tool_call(item)
        }
        "toolresult" | "tool_result" | "function_call_output" => parse_tool_result(item),
        _ if obj.contains_key("name") && obj.contains_key("arguments") => parse_tool_call(item),
        "" => str_field(item, &["text"])
            .map(|t| ContentBlock::Text(t.to_string()))
            .unwrap_or(ContentBlock::Other),
        _ => ContentBlock::Other,
    }
}

fn str_field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| item.get(*k).and_then(Value::as_str))
}

fn parse_tool_call(item: &Value) -> ContentBlock {
    let name = str_field(item, &["name", "toolName", "tool_name"])
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(FALLBACK_TOOL_NAME)
        .to_string();
    let args = ["arguments", "input", "args"]
        .iter()
        .find_map(|k| item.get(*k))
        .map(coerce_args)
        .unwrap_or(Value::Null);
    let id = str_field(item, &["id", "toolCallId", "tool_call_id", "call_id"]).map(String::from);
    ContentBlock::ToolCall { name, args, id }
}

/// Arguments that arrive as a JSON-looking string become structured values
/// when they parse; anything else is kept as-is.
pub fn coerce_args(raw: &Value) -> Value {
    if let Some(s) = raw.as_str() {
        let trimmed = s.trim();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && let Ok(parsed) = serde_json::from_str::<Value>(trimmed)
        {
            return parsed;
        }
    }
    raw.clone()
}

fn parse_tool_result(item: &Value) -> ContentBlock {
    let name = str_field(item, &["name", "toolName", "tool_name"])
        .filter(|n| !n.trim().is_empty())
        .map(String::from);
    let text = str_field(item, &["text"])
        .map(String::from)
        .or_else(|| item.get("content").and_then(flatten_text))
        .or_else(|| str_field(item, &["output"]).map(String::from));
    let id = str_field(
        item,
        &["toolCallId", "tool_call_id", "tool_use_id", "toolUseId", "call_id", "id"],
    )
    .map(String::from);
    ContentBlock::ToolResult { name, text, id }
}

/// Text payload of a nested `content` field: a string, or the text parts of
/// a block array joined by newlines.
fn flatten_text(val: &Value) -> Option<String> {
    if let Some(s) = val.as_str() {
        return Some(s.to_string());
    }
    let parts: Vec<&str> = val
        .as_array()?
        .iter()
        .filter_map(|part| match part {
            Value::String(s) => Some(s.as_str()),
            other => match parse_block(other) {
                ContentBlock::Text(_) => other.get("text").and_then(Value::as_str),
                _ => None,
            },
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

fn parse_image(item: &Value) -> Option<ImageBlock> {
    let alt = str_field(item, &["alt", "alt_text", "altText"])
        .filter(|s| !s.trim().is_empty())
        .map(String::from);

    // image_url: "https://..." or {"url": "..."}
    if let Some(url_val) = item.get("image_url") {
        let url = url_val
            .as_str()
            .or_else(|| url_val.get("url").and_then(Value::as_str))?;
        return accept_image_url(url).map(|url| ImageBlock { url, alt });
    }

    // {"source": {"type": "base64", "media_type": ..., "data": ...}} or {"source": {"url": ...}}
    let source = item.get("source").unwrap_or(item);
    if let Some(data) = str_field(source, &["data"]) {
        let media_type = str_field(source, &["media_type", "mediaType", "mimeType", "mime_type"])
            .or_else(|| str_field(item, &["media_type", "mediaType", "mimeType", "mime_type"]))
            .unwrap_or(DEFAULT_IMAGE_MEDIA_TYPE);
        return inline_image_url(data, media_type).map(|url| ImageBlock { url, alt });
    }
    let url = str_field(source, &["url"]).or_else(|| str_field(item, &["url"]))?;
    accept_image_url(url).map(|url| ImageBlock { url, alt })
}

/// Build a `data:` URL from a base64 payload, synthesizing the prefix when
/// the producer sent bare base64.
fn inline_image_url(data: &str, media_type: &str) -> Option<String> {
    let data = data.trim();
    if data.starts_with("data:") {
        return accept_image_url(data);
    }
    let media_type = media_type.trim().to_ascii_lowercase();
    if !media_type.starts_with("image/") || !is_token(&media_type) {
        return None;
    }
    if STANDARD.decode(data).is_err() {
        trace!(
            component = "extract",
            operation = "inline_image",
            len = data.len(),
            "Dropping image with invalid base64 payload"
        );
        return None;
    }
    Some(format!("data:{media_type};base64,{data}"))
}

fn is_token(media_type: &str) -> bool {
    media_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '+' | '-' | '.'))
}

/// Only absolute http(s) URLs and `data:image/` URLs are displayable.
fn accept_image_url(url: &str) -> Option<String> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") || lower.starts_with("data:image/")
    {
        Some(url.to_string())
    } else {
        None
    }
}

/// Split `<think>` spans out of assistant text.
fn split_think_tags(text: &str) -> (String, Vec<String>) {
    if !THINK_TAG_RE.is_match(text) {
        return (text.to_string(), Vec::new());
    }
    let mut thoughts = Vec::new();
    for caps in THINK_TAG_RE.captures_iter(text) {
        if let Some(inner) = caps.get(2) {
            let inner = inner.as_str().trim();
            if !inner.is_empty() {
                thoughts.push(inner.to_string());
            }
        }
    }
    let visible = THINK_TAG_RE.replace_all(text, "").trim().to_string();
    (visible, thoughts)
}

fn join_non_blank(parts: Vec<String>) -> Option<String> {
    let joined = parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extract text, reasoning, images and tool cards from one message.
pub fn extract_content(message: &RawMessage) -> ExtractedContent {
    let mut texts = Vec::new();
    let mut thoughts = Vec::new();
    let mut images = Vec::new();
    let mut tool_cards = Vec::new();
    let is_assistant = role_of(message) == CanonicalRole::Assistant;

    for block in content_blocks(message) {
        match block {
            ContentBlock::Text(text) if is_assistant => {
                let (visible, inline_thoughts) = split_think_tags(&text);
                texts.push(visible);
                thoughts.extend(inline_thoughts);
            }
            ContentBlock::Text(text) => texts.push(text),
            ContentBlock::Thinking(text) => thoughts.push(text),
            ContentBlock::Image(image) => images.push(image),
            ContentBlock::ToolCall { name, args, id } => tool_cards.push(ToolCard::Call {
                name,
                args,
                tool_call_id: id,
            }),
            ContentBlock::ToolResult { name, text, id } => tool_cards.push(ToolCard::Result {
                name: name
                    .or_else(|| message.tool_name_hint().map(String::from))
                    .unwrap_or_else(|| FALLBACK_TOOL_NAME.to_string()),
                text,
                tool_call_id: id.or_else(|| message.tool_call_id.clone()),
            }),
            ContentBlock::Other => {}
        }
    }

    let text = join_non_blank(texts);

    if is_tool_result_message(message) && !tool_cards.iter().any(ToolCard::is_result) {
        tool_cards.push(ToolCard::Result {
            name: message
                .tool_name_hint()
                .unwrap_or(FALLBACK_TOOL_NAME)
                .to_string(),
            text: text.clone(),
            tool_call_id: message.tool_call_id.clone(),
        });
    }

    ExtractedContent {
        text,
        thinking: join_non_blank(thoughts),
        images,
        tool_cards,
    }
}

/// Identity plus a fingerprint of role and content. Producers may split one
/// logical message into several records sharing an id.
fn cache_key(message: &RawMessage) -> Option<String> {
    let identity = message.stable_key()?;
    let content = message
        .content
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();
    let fingerprint = fxhash::hash64(&(message.role.as_str(), content.as_str()));
    Some(format!("{identity}:{fingerprint:016x}"))
}

/// LRU memo of extraction results keyed by message identity and content.
pub struct ExtractionCache {
    entries: LruCache<String, ExtractedContent>,
    hits: u64,
    misses: u64,
}

impl ExtractionCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached extraction for `message`, computing it on a miss.
    ///
    /// Messages without a stable key are extracted every time.
    pub fn get_or_extract(&mut self, message: &RawMessage) -> ExtractedContent {
        let Some(key) = cache_key(message) else {
            return extract_content(message);
        };
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            return hit.clone();
        }
        self.misses += 1;
        let extracted = extract_content(message);
        self.entries.put(key, extracted.clone());
        extracted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
