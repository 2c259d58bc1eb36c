//! Render-ready transcript output.
//!
//! [`TranscriptPipeline`] owns the per-view caches and turns grouper output
//! into render units: groups with per-message sanitized HTML and resolved
//! tool cards, reading indicators, and partial stream renders.

pub mod html;

use std::num::NonZeroUsize;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::config::{PipelineConfig, RenderOptions, ToolPreviewLimits};
use crate::extract::{ExtractionCache, extract_content};
use crate::markdown::MarkdownPipeline;
use crate::model::{CanonicalRole, ImageBlock, RawMessage, ToolCard};
use crate::tool_cards::{
    ToolStatus, extract_error_message, format_args, format_tool_output, infer_status,
    summarize_args, truncated_preview,
};
use crate::transcript::{
    ChatEntry, ChatSession, GroupedMessage, MessageGroup, TranscriptItem, group_entries,
};

/// One unit handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RenderUnit {
    Group(RenderedGroup),
    ReadingIndicator {
        key: String,
    },
    Stream {
        key: String,
        started_at: i64,
        html: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedGroup {
    pub key: String,
    pub role: CanonicalRole,
    pub timestamp: i64,
    pub is_streaming: bool,
    pub messages: Vec<RenderedMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMessage {
    pub key: String,
    pub role: CanonicalRole,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_html: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageBlock>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_cards: Vec<ToolCardView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCardKind {
    Call,
    Result,
}

/// A tool card resolved for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCardView {
    pub kind: ToolCardKind,
    pub name: String,
    pub label: String,
    /// Icon name understood by the document writer.
    pub icon: &'static str,
    /// Inferred from result payloads; calls carry none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_html: Option<String>,
    /// Payload is short enough to show in full without a preview.
    pub inline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderStats {
    pub groups: usize,
    pub messages: usize,
    pub skipped_messages: usize,
    pub tool_cards: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderedTranscript {
    pub units: Vec<RenderUnit>,
    pub stats: RenderStats,
}

/// Icon name for a tool, by name.
pub fn tool_icon(tool_name: &str) -> &'static str {
    match tool_name.to_lowercase().as_str() {
        "bash" | "shell" | "terminal" | "exec" => "terminal",
        "read" | "read_file" | "readfile" => "file-text",
        "write" | "write_file" | "writefile" | "edit" => "pencil",
        "glob" | "find" | "grep" | "search" | "websearch" | "web_search" => "search",
        "webfetch" | "fetch" | "http" | "curl" | "browser" => "globe",
        "task" | "agent" => "sparkles",
        n if n.contains("mail") || n.contains("message") => "mail",
        n if n.contains("sql") || n.contains("db") || n.contains("database") => "database",
        _ => "wrench",
    }
}

/// Human label for a tool name: `mcp__server__read_file` -> `Read File`.
pub fn tool_label(tool_name: &str) -> String {
    let base = tool_name.rsplit("__").next().unwrap_or(tool_name);
    let label = base
        .split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    if label.is_empty() {
        "Tool".to_string()
    } else {
        label
    }
}

/// Owns the markdown and extraction caches for one transcript view.
pub struct TranscriptPipeline {
    markdown: MarkdownPipeline,
    extraction: ExtractionCache,
    tool_preview: ToolPreviewLimits,
}

impl TranscriptPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.extraction_cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self::with_markdown(
            MarkdownPipeline::new(config.markdown),
            ExtractionCache::new(capacity),
            config.tool_preview,
        )
    }

    pub fn with_markdown(
        markdown: MarkdownPipeline,
        extraction: ExtractionCache,
        tool_preview: ToolPreviewLimits,
    ) -> Self {
        Self {
            markdown,
            extraction,
            tool_preview,
        }
    }

    pub fn markdown(&self) -> &MarkdownPipeline {
        &self.markdown
    }

    pub fn extraction_cache(&self) -> &ExtractionCache {
        &self.extraction
    }

    pub fn render_session(
        &mut self,
        session: &ChatSession,
        options: &RenderOptions,
    ) -> RenderedTranscript {
        self.render_entries(&session.entries(options.history_limit), options)
    }

    pub fn render_entries(
        &mut self,
        entries: &[ChatEntry],
        options: &RenderOptions,
    ) -> RenderedTranscript {
        let started = Instant::now();
        let items = group_entries(entries);
        let mut stats = RenderStats::default();
        let mut units = Vec::with_capacity(items.len());

        for item in items {
            match item {
                TranscriptItem::Group(group) => {
                    if let Some(rendered) = self.render_group(&group, options, &mut stats) {
                        units.push(RenderUnit::Group(rendered));
                    }
                }
                TranscriptItem::ReadingIndicator { key } => {
                    units.push(RenderUnit::ReadingIndicator { key });
                }
                TranscriptItem::Stream {
                    text,
                    started_at,
                    key,
                } => {
                    units.push(RenderUnit::Stream {
                        html: self.render_stream_text(&text),
                        started_at,
                        key,
                    });
                }
            }
        }

        let (extraction_hits, extraction_misses) = self.extraction.stats();
        info!(
            component = "transcript_render",
            operation = "render_entries",
            entries = entries.len(),
            units = units.len(),
            groups = stats.groups,
            messages = stats.messages,
            skipped_messages = stats.skipped_messages,
            tool_cards = stats.tool_cards,
            markdown_cache_len = self.markdown.cache().len(),
            extraction_hits,
            extraction_misses,
            duration_ms = started.elapsed().as_millis(),
            "Rendered transcript"
        );
        RenderedTranscript { units, stats }
    }

    fn render_group(
        &mut self,
        group: &MessageGroup,
        options: &RenderOptions,
        stats: &mut RenderStats,
    ) -> Option<RenderedGroup> {
        let mut messages = Vec::with_capacity(group.len());
        for grouped in &group.messages {
            match self.render_message(grouped, options) {
                Some(rendered) => {
                    stats.tool_cards += rendered.tool_cards.len();
                    messages.push(rendered);
                }
                None => stats.skipped_messages += 1,
            }
        }
        debug!(
            component = "transcript_render",
            operation = "render_group",
            role = group.role.as_str(),
            messages = group.len(),
            rendered = messages.len(),
            is_streaming = group.is_streaming,
            "Rendered group"
        );
        if messages.is_empty() {
            return None;
        }
        stats.groups += 1;
        stats.messages += messages.len();
        Some(RenderedGroup {
            key: group.key(),
            role: group.role,
            timestamp: group.timestamp,
            is_streaming: group.is_streaming,
            messages,
        })
    }

    /// Render one message, or `None` when it carries nothing displayable.
    pub fn render_message(
        &mut self,
        grouped: &GroupedMessage,
        options: &RenderOptions,
    ) -> Option<RenderedMessage> {
        let message = &grouped.message;
        let extracted = self.extraction.get_or_extract(&message.original);

        // Tool output already appears on its result card.
        let body = if message.role == CanonicalRole::Tool
            && extracted.tool_cards.iter().any(ToolCard::is_result)
        {
            None
        } else {
            extracted.text.as_deref()
        };
        let html = body
            .map(|text| self.markdown.to_safe_html(text))
            .filter(|html| !html.is_empty());
        let thinking_html = extracted
            .thinking
            .as_deref()
            .filter(|_| options.show_thinking)
            .map(|text| self.markdown.to_safe_html(text))
            .filter(|html| !html.is_empty());
        let tool_cards: Vec<ToolCardView> = extracted
            .tool_cards
            .iter()
            .map(|card| self.tool_card_view(card, options))
            .collect();

        if html.is_none() && thinking_html.is_none() && extracted.images.is_empty() && tool_cards.is_empty() {
            trace!(
                component = "transcript_render",
                operation = "skip_message",
                key = grouped.key.as_str(),
                "Nothing to render"
            );
            return None;
        }

        trace!(
            component = "transcript_render",
            operation = "render_message",
            key = grouped.key.as_str(),
            role = message.role.as_str(),
            tool_cards = tool_cards.len(),
            images = extracted.images.len(),
            "Rendered message"
        );
        Some(RenderedMessage {
            key: grouped.key.clone(),
            role: message.role,
            timestamp: message.timestamp,
            html,
            thinking_html,
            images: extracted.images,
            tool_cards,
        })
    }

    /// Resolve a tool card for display.
    pub fn tool_card_view(&mut self, card: &ToolCard, options: &RenderOptions) -> ToolCardView {
        let limits = self.tool_preview;
        match card {
            ToolCard::Call {
                name,
                args,
                tool_call_id,
            } => {
                let full = format_args(args);
                let inline = full
                    .as_deref()
                    .is_none_or(|text| text.chars().count() <= limits.inline_threshold);
                let preview = summarize_args(args)
                    .or_else(|| full.clone())
                    .map(|text| truncated_preview(&text, limits.max_lines, limits.max_chars));
                let detail_html = full.filter(|_| options.show_tool_details || inline).map(|text| {
                    let fenced = if args.is_string() {
                        text
                    } else {
                        format!("```json\n{text}\n```")
                    };
                    self.markdown.to_safe_html(&fenced)
                });
                ToolCardView {
                    kind: ToolCardKind::Call,
                    name: name.clone(),
                    label: tool_label(name),
                    icon: tool_icon(name),
                    status: None,
                    preview,
                    error: None,
                    detail_html: detail_html.filter(|html| !html.is_empty()),
                    inline,
                    tool_call_id: tool_call_id.clone(),
                }
            }
            ToolCard::Result {
                name,
                text,
                tool_call_id,
            } => {
                let text = text.as_deref().filter(|t| !t.trim().is_empty());
                let status = infer_status(text);
                let error = (status.status == ToolStatus::Error)
                    .then(|| text.and_then(extract_error_message).or(status.message.clone()))
                    .flatten();
                let inline = text.is_none_or(|t| t.chars().count() <= limits.inline_threshold);
                let preview =
                    text.map(|t| truncated_preview(t, limits.max_lines, limits.max_chars));
                let detail_html = text
                    .filter(|_| options.show_tool_details || inline)
                    .map(|t| self.markdown.to_safe_html(&format_tool_output(t)))
                    .filter(|html| !html.is_empty());
                ToolCardView {
                    kind: ToolCardKind::Result,
                    name: name.clone(),
                    label: tool_label(name),
                    icon: tool_icon(name),
                    status: Some(status.status),
                    preview,
                    error,
                    detail_html,
                    inline,
                    tool_call_id: tool_call_id.clone(),
                }
            }
        }
    }

    /// Partial assistant text. Bypasses the markdown cache so intermediate
    /// deltas never evict settled history.
    fn render_stream_text(&self, text: &str) -> String {
        let extracted = extract_content(&RawMessage::new("assistant", text));
        extracted
            .text
            .map(|visible| self.markdown.to_safe_html_uncached(&visible))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{StreamEvent, build_chat_entries};
    use serde_json::json;

    fn pipeline() -> TranscriptPipeline {
        TranscriptPipeline::new(&PipelineConfig::default())
    }

    fn groups(transcript: &RenderedTranscript) -> Vec<&RenderedGroup> {
        transcript
            .units
            .iter()
            .filter_map(|u| match u {
                RenderUnit::Group(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    fn render(messages: Vec<RawMessage>, options: &RenderOptions) -> RenderedTranscript {
        pipeline().render_entries(&build_chat_entries(&messages, 100), options)
    }

    #[test]
    fn tool_error_result_card() {
        let messages = vec![
            RawMessage::new("toolResult", r#"{"status":"error","error":"disk full"}"#)
                .with_tool_call_id("c1")
                .with_tool_name("bash"),
        ];
        let out = render(messages, &RenderOptions::default());
        let g = groups(&out);
        assert_eq!(g.len(), 1);
        let msg = &g[0].messages[0];
        assert!(msg.html.is_none(), "tool output is shown on its card only");
        let card = &msg.tool_cards[0];
        assert_eq!(card.kind, ToolCardKind::Result);
        assert_eq!(card.status, Some(ToolStatus::Error));
        assert_eq!(card.error.as_deref(), Some("disk full"));
        assert_eq!(card.icon, "terminal");
        assert_eq!(card.label, "Bash");
        let detail = card.detail_html.as_deref().unwrap();
        assert!(detail.contains("<strong>Error:</strong> disk full"));
    }

    #[test]
    fn empty_messages_render_nothing() {
        let messages = vec![
            RawMessage::new("user", "hello"),
            RawMessage::new("assistant", json!([])),
            RawMessage::new("assistant", "   "),
        ];
        let out = render(messages, &RenderOptions::default());
        let g = groups(&out);
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].role, CanonicalRole::User);
        assert_eq!(out.stats.skipped_messages, 2);
    }

    #[test]
    fn thinking_follows_option() {
        let messages = vec![RawMessage::new(
            "assistant",
            json!([
                {"type": "thinking", "thinking": "plan it"},
                {"type": "text", "text": "done"}
            ]),
        )];
        let hidden = render(messages.clone(), &RenderOptions::default());
        assert!(groups(&hidden)[0].messages[0].thinking_html.is_none());

        let shown = render(
            messages,
            &RenderOptions {
                show_thinking: true,
                ..RenderOptions::default()
            },
        );
        let msg = &groups(&shown)[0].messages[0];
        assert!(msg.thinking_html.as_deref().unwrap().contains("plan it"));
        assert!(msg.html.as_deref().unwrap().contains("done"));
    }

    #[test]
    fn call_card_previews_arguments() {
        let messages = vec![RawMessage::new(
            "assistant",
            json!([{"type": "toolCall", "name": "bash", "arguments": "{\"cmd\":\"ls -la\"}"}]),
        )];
        let out = render(messages, &RenderOptions::default());
        let card = &groups(&out)[0].messages[0].tool_cards[0];
        assert_eq!(card.kind, ToolCardKind::Call);
        assert_eq!(card.preview.as_deref(), Some("cmd: ls -la"));
        assert!(card.status.is_none());
        assert!(card.detail_html.as_deref().unwrap().contains("ls -la"));
    }

    #[test]
    fn collapsed_details_keep_short_output_inline() {
        let collapsed = RenderOptions {
            show_tool_details: false,
            ..RenderOptions::default()
        };
        let long = "line\n".repeat(100);
        let messages = vec![
            RawMessage::new("tool", long.clone()).with_tool_call_id("a"),
            RawMessage::new("tool", "ok").with_tool_call_id("b"),
        ];
        let out = render(messages, &collapsed);
        let g = groups(&out);
        let long_card = &g[0].messages[0].tool_cards[0];
        assert!(!long_card.inline);
        assert!(long_card.detail_html.is_none());
        assert_eq!(long_card.preview.as_deref(), Some("line\nline…"));

        let short_card = &g[0].messages[1].tool_cards[0];
        assert!(short_card.inline);
        assert!(short_card.detail_html.is_some());
        assert_eq!(short_card.status, Some(ToolStatus::Success));
    }

    #[test]
    fn stream_renders_bypass_markdown_cache() {
        let mut session = ChatSession::from_messages(vec![RawMessage::new("user", "question")]);
        session.apply(StreamEvent::StreamDelta {
            text: "partial **answer**".into(),
            started_at: Some(1_700_000_000_000),
        });
        let mut pipeline = pipeline();
        let out = pipeline.render_session(&session, &RenderOptions::default());
        match out.units.last() {
            Some(RenderUnit::Stream { html, .. }) => {
                assert!(html.contains("<strong>answer</strong>"));
            }
            other => panic!("expected stream unit, got {other:?}"),
        }
        assert_eq!(pipeline.markdown().cache().len(), 1);
        assert!(pipeline.markdown().cache().contains("question"));
    }

    #[test]
    fn reading_indicator_passes_through() {
        let mut session = ChatSession::new();
        session.apply(StreamEvent::ReadingIndicatorBegin);
        let out = pipeline().render_session(&session, &RenderOptions::default());
        assert!(matches!(out.units.as_slice(), [RenderUnit::ReadingIndicator { .. }]));
    }

    #[test]
    fn extraction_is_memoized_by_message_id() {
        let messages = vec![RawMessage::new("user", "hi").with_id("m1")];
        let entries = build_chat_entries(&messages, 10);
        let mut pipeline = pipeline();
        pipeline.render_entries(&entries, &RenderOptions::default());
        pipeline.render_entries(&entries, &RenderOptions::default());
        assert_eq!(pipeline.extraction_cache().stats(), (1, 1));
    }

    #[test]
    fn split_records_with_one_id_render_separately() {
        let messages = vec![
            RawMessage::new("assistant", "first block").with_id("msg_1"),
            RawMessage::new("assistant", "second block").with_id("msg_1"),
        ];
        let out = render(messages, &RenderOptions::default());
        let g = groups(&out);
        let html: Vec<_> = g[0].messages.iter().map(|m| m.html.as_deref()).collect();
        assert_eq!(html, [Some("<p>first block</p>\n"), Some("<p>second block</p>\n")]);
    }

    #[test]
    fn labels_and_icons() {
        assert_eq!(tool_label("mcp__files__read_file"), "Read File");
        assert_eq!(tool_label("web-fetch"), "Web Fetch");
        assert_eq!(tool_label(""), "Tool");
        assert_eq!(tool_icon("Read"), "file-text");
        assert_eq!(tool_icon("postgres_db_query"), "database");
        assert_eq!(tool_icon("mystery"), "wrench");
    }

    #[test]
    fn units_serialize_with_type_tags() {
        let out = render(vec![RawMessage::new("user", "hi")], &RenderOptions::default());
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["units"][0]["type"], "group");
        assert_eq!(value["units"][0]["role"], "user");
        let html = value["units"][0]["messages"][0]["html"].as_str().unwrap();
        assert!(html.contains("<p>hi</p>"));
    }
}
