//! Render units to a standalone HTML document.
//!
//! Message bodies, reasoning and tool details arrive already sanitized from
//! the markdown pipeline and are inserted verbatim. Everything else written
//! here (names, labels, previews, URLs, timestamps) is escaped on the way
//! out.

use std::time::Instant;

use chrono::DateTime;
use tracing::debug;

use super::{
    RenderUnit, RenderedGroup, RenderedMessage, RenderedTranscript, ToolCardKind, ToolCardView,
};
use crate::markdown::html_escape;
use crate::model::{CanonicalRole, ImageBlock};
use crate::tool_cards::ToolStatus;

/// Palette shared by the stylesheet.
pub mod colors {
    pub const BG_DEEP: &str = "#1a1b26";
    pub const BG_SURFACE: &str = "#24283b";
    pub const BORDER: &str = "#3b4261";
    pub const TEXT_PRIMARY: &str = "#c0caf5";
    pub const TEXT_MUTED: &str = "#696e9e";
    pub const ROLE_USER: &str = "#9ece6a";
    pub const ROLE_AGENT: &str = "#7aa2f7";
    pub const ROLE_TOOL: &str = "#ff9e64";
    pub const ROLE_SYSTEM: &str = "#e0af68";
    pub const STATUS_SUCCESS: &str = "#73daca";
    pub const STATUS_WARNING: &str = "#e0af68";
    pub const STATUS_ERROR: &str = "#f7768e";
    pub const STATUS_INFO: &str = "#7dcfff";
}

#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub title: String,
    pub show_timestamps: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            title: "Chat transcript".to_string(),
            show_timestamps: true,
        }
    }
}

// Lucide SVG icons (16x16, stroke-width: 2)

const ICON_USER: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M19 21v-2a4 4 0 0 0-4-4H9a4 4 0 0 0-4 4v2"/><circle cx="12" cy="7" r="4"/></svg>"#;
const ICON_BOT: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M12 8V4H8"/><rect width="16" height="12" x="4" y="8" rx="2"/><path d="M2 14h2"/><path d="M20 14h2"/><path d="M15 13v2"/><path d="M9 13v2"/></svg>"#;
const ICON_WRENCH: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M14.7 6.3a1 1 0 0 0 0 1.4l1.6 1.6a1 1 0 0 0 1.4 0l3.77-3.77a6 6 0 0 1-7.94 7.94l-6.91 6.91a2.12 2.12 0 0 1-3-3l6.91-6.91a6 6 0 0 1 7.94-7.94l-3.76 3.76z"/></svg>"#;
const ICON_MESSAGE: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M21 15a2 2 0 0 1-2 2H7l-4 4V5a2 2 0 0 1 2-2h14a2 2 0 0 1 2 2z"/></svg>"#;
const ICON_TERMINAL: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><polyline points="4 17 10 11 4 5"/><line x1="12" x2="20" y1="19" y2="19"/></svg>"#;
const ICON_FILE_TEXT: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M15 2H6a2 2 0 0 0-2 2v16a2 2 0 0 0 2 2h12a2 2 0 0 0 2-2V7Z"/><path d="M14 2v4a2 2 0 0 0 2 2h4"/><path d="M10 9H8"/><path d="M16 13H8"/><path d="M16 17H8"/></svg>"#;
const ICON_PENCIL: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M21.174 6.812a1 1 0 0 0-3.986-3.987L3.842 16.174a2 2 0 0 0-.5.83l-1.321 4.352a.5.5 0 0 0 .623.622l4.353-1.32a2 2 0 0 0 .83-.497z"/><path d="m15 5 4 4"/></svg>"#;
const ICON_SEARCH: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><circle cx="11" cy="11" r="8"/><path d="m21 21-4.3-4.3"/></svg>"#;
const ICON_GLOBE: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><circle cx="12" cy="12" r="10"/><path d="M12 2a14.5 14.5 0 0 0 0 20 14.5 14.5 0 0 0 0-20"/><path d="M2 12h20"/></svg>"#;
const ICON_SPARKLES: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><path d="M9.937 15.5A2 2 0 0 0 8.5 14.063l-6.135-1.582a.5.5 0 0 1 0-.962L8.5 9.936A2 2 0 0 0 9.937 8.5l1.582-6.135a.5.5 0 0 1 .963 0L14.063 8.5A2 2 0 0 0 15.5 9.937l6.135 1.581a.5.5 0 0 1 0 .964L15.5 14.063a2 2 0 0 0-1.437 1.437l-1.582 6.135a.5.5 0 0 1-.963 0z"/><path d="M20 3v4"/><path d="M22 5h-4"/></svg>"#;
const ICON_MAIL: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><rect width="20" height="16" x="2" y="4" rx="2"/><path d="m22 7-8.97 5.7a1.94 1.94 0 0 1-2.06 0L2 7"/></svg>"#;
const ICON_DATABASE: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="16" height="16" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><ellipse cx="12" cy="5" rx="9" ry="3"/><path d="M3 5V19A9 3 0 0 0 21 19V5"/><path d="M3 12A9 3 0 0 0 21 12"/></svg>"#;
const ICON_CHECK: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="14" height="14" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"><path d="M20 6 9 17l-5-5"/></svg>"#;
const ICON_X: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="14" height="14" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"><path d="M18 6 6 18"/><path d="m6 6 12 12"/></svg>"#;
const ICON_ALERT: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="14" height="14" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"><path d="m21.73 18-8-14a2 2 0 0 0-3.48 0l-8 14A2 2 0 0 0 4 21h16a2 2 0 0 0 1.73-3"/><path d="M12 9v4"/><path d="M12 17h.01"/></svg>"#;
const ICON_INFO: &str = r#"<svg class="lucide-icon" xmlns="http://www.w3.org/2000/svg" width="14" height="14" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"><circle cx="12" cy="12" r="10"/><path d="M12 16v-4"/><path d="M12 8h.01"/></svg>"#;

/// SVG for an icon name produced by [`super::tool_icon`].
fn icon_svg(name: &str) -> &'static str {
    match name {
        "terminal" => ICON_TERMINAL,
        "file-text" => ICON_FILE_TEXT,
        "pencil" => ICON_PENCIL,
        "search" => ICON_SEARCH,
        "globe" => ICON_GLOBE,
        "sparkles" => ICON_SPARKLES,
        "mail" => ICON_MAIL,
        "database" => ICON_DATABASE,
        _ => ICON_WRENCH,
    }
}

fn status_icon(status: ToolStatus) -> &'static str {
    match status {
        ToolStatus::Success => ICON_CHECK,
        ToolStatus::Error => ICON_X,
        ToolStatus::Warning => ICON_ALERT,
        ToolStatus::Info => ICON_INFO,
    }
}

fn role_icon(role: CanonicalRole) -> &'static str {
    match role {
        CanonicalRole::User => ICON_USER,
        CanonicalRole::Assistant => ICON_BOT,
        CanonicalRole::Tool => ICON_WRENCH,
        CanonicalRole::Unknown => ICON_MESSAGE,
    }
}

fn role_class(role: CanonicalRole) -> &'static str {
    match role {
        CanonicalRole::User => "message-user",
        CanonicalRole::Assistant => "message-assistant",
        CanonicalRole::Tool => "message-tool",
        CanonicalRole::Unknown => "message-system",
    }
}

/// Author label shown in a group header.
pub fn author_label(role: CanonicalRole) -> &'static str {
    match role {
        CanonicalRole::User => "You",
        CanonicalRole::Assistant => "Assistant",
        CanonicalRole::Tool => "Tool",
        CanonicalRole::Unknown => "System",
    }
}

/// Epoch millis as `YYYY-MM-DD HH:MM:SS UTC`; `None` for a missing (zero)
/// or out-of-range timestamp.
pub fn format_timestamp(millis: i64) -> Option<(String, String)> {
    if millis == 0 {
        return None;
    }
    let dt = DateTime::from_timestamp_millis(millis)?;
    Some((
        dt.to_rfc3339(),
        dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    ))
}

const SCRIPT: &str = r#"function copyCodeBlock(btn) {
  var code = btn.getAttribute('data-code') || '';
  if (navigator.clipboard) {
    navigator.clipboard.writeText(code).then(function () {
      var label = btn.textContent;
      btn.textContent = 'Copied';
      setTimeout(function () { btn.textContent = label; }, 1500);
    });
  }
}"#;

fn stylesheet() -> String {
    use colors::*;
    format!(
        r#":root {{
  --bg-deep: {BG_DEEP}; --bg-surface: {BG_SURFACE}; --border: {BORDER};
  --text-primary: {TEXT_PRIMARY}; --text-muted: {TEXT_MUTED};
  --role-user: {ROLE_USER}; --role-agent: {ROLE_AGENT}; --role-tool: {ROLE_TOOL}; --role-system: {ROLE_SYSTEM};
  --status-success: {STATUS_SUCCESS}; --status-warning: {STATUS_WARNING}; --status-error: {STATUS_ERROR}; --status-info: {STATUS_INFO};
}}
body {{ background: var(--bg-deep); color: var(--text-primary); font-family: system-ui, sans-serif; margin: 0; }}
main {{ max-width: 860px; margin: 0 auto; padding: 24px 16px; }}
.message-group {{ border-left: 3px solid var(--border); background: var(--bg-surface); border-radius: 8px; margin: 12px 0; padding: 10px 14px; }}
.message-group.message-user {{ border-color: var(--role-user); }}
.message-group.message-assistant {{ border-color: var(--role-agent); }}
.message-group.message-tool {{ border-color: var(--role-tool); }}
.message-group.message-system {{ border-color: var(--role-system); }}
.message-header {{ display: flex; align-items: center; gap: 8px; color: var(--text-muted); font-size: 13px; }}
.message-author {{ font-weight: 600; color: var(--text-primary); }}
.message-reasoning {{ border-left: 2px solid var(--border); padding-left: 10px; color: var(--text-muted); }}
.message-images img {{ max-width: 100%; border-radius: 6px; }}
.code-block-wrapper {{ border: 1px solid var(--border); border-radius: 6px; margin: 8px 0; }}
.code-block-header {{ display: flex; justify-content: space-between; padding: 4px 8px; font-size: 12px; color: var(--text-muted); }}
pre {{ overflow-x: auto; padding: 8px; margin: 0; }}
.token.keyword, .token.boolean {{ color: #bb9af7; }}
.token.string, .token.char {{ color: #9ece6a; }}
.token.number {{ color: #ff9e64; }}
.token.comment {{ color: var(--text-muted); font-style: italic; }}
.token.property, .token.function {{ color: #7aa2f7; }}
.tool-card {{ border: 1px solid var(--border); border-radius: 6px; margin: 8px 0; padding: 6px 10px; }}
.tool-card-header {{ display: flex; align-items: center; gap: 6px; font-size: 13px; }}
.tool-card-preview {{ white-space: pre-wrap; color: var(--text-muted); font-family: ui-monospace, monospace; font-size: 12px; }}
.tool-card-error {{ color: var(--status-error); font-size: 13px; }}
.tool-status-success .tool-card-status {{ color: var(--status-success); }}
.tool-status-warning .tool-card-status {{ color: var(--status-warning); }}
.tool-status-error .tool-card-status {{ color: var(--status-error); }}
.tool-status-info .tool-card-status {{ color: var(--status-info); }}
.reading-indicator span {{ display: inline-block; width: 6px; height: 6px; margin: 0 2px; border-radius: 50%; background: var(--text-muted); }}
"#
    )
}

/// Render a whole transcript as a standalone page.
pub fn render_document(transcript: &RenderedTranscript, options: &DocumentOptions) -> String {
    let started = Instant::now();
    let mut body = String::new();
    for unit in &transcript.units {
        body.push_str(&render_unit(unit, options));
        body.push('\n');
    }

    let document = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
{styles}</style>
</head>
<body>
<main class="transcript" role="log">
<h1 class="transcript-title">{title}</h1>
{body}</main>
<script>
{script}
</script>
</body>
</html>
"#,
        title = html_escape(&options.title),
        styles = stylesheet(),
        body = body,
        script = SCRIPT,
    );

    debug!(
        component = "html_document",
        operation = "render_document",
        units = transcript.units.len(),
        bytes = document.len(),
        duration_ms = started.elapsed().as_millis(),
        "Document rendered"
    );
    document
}

pub fn render_unit(unit: &RenderUnit, options: &DocumentOptions) -> String {
    match unit {
        RenderUnit::Group(group) => render_group(group, options),
        RenderUnit::ReadingIndicator { key } => format!(
            r#"<div class="reading-indicator" data-key="{key}" aria-live="polite" aria-label="Assistant is responding"><span></span><span></span><span></span></div>"#,
            key = html_escape(key)
        ),
        RenderUnit::Stream {
            key,
            started_at,
            html,
        } => {
            let time = time_element(*started_at, options);
            format!(
                r#"<section class="message-group message-assistant streaming" data-key="{key}" aria-busy="true">
<header class="message-header"><span class="message-icon" aria-hidden="true">{icon}</span><span class="message-author">{author}</span>{time}</header>
<div class="message-content">{html}</div>
</section>"#,
                key = html_escape(key),
                icon = ICON_BOT,
                author = author_label(CanonicalRole::Assistant),
            )
        }
    }
}

fn time_element(millis: i64, options: &DocumentOptions) -> String {
    if !options.show_timestamps {
        return String::new();
    }
    format_timestamp(millis)
        .map(|(iso, display)| {
            format!(
                r#"<time class="message-time" datetime="{}">{}</time>"#,
                html_escape(&iso),
                html_escape(&display)
            )
        })
        .unwrap_or_default()
}

fn render_group(group: &RenderedGroup, options: &DocumentOptions) -> String {
    let mut messages = String::new();
    for message in &group.messages {
        messages.push_str(&render_message(message));
    }
    let streaming = if group.is_streaming { " streaming" } else { "" };
    format!(
        r#"<section class="message-group {role_class}{streaming}" data-key="{key}" aria-label="{role} messages">
<header class="message-header"><span class="message-icon" aria-hidden="true">{icon}</span><span class="message-author">{author}</span>{time}</header>
{messages}</section>"#,
        role_class = role_class(group.role),
        key = html_escape(&group.key),
        role = group.role.as_str(),
        icon = role_icon(group.role),
        author = author_label(group.role),
        time = time_element(group.timestamp, options),
    )
}

fn render_message(message: &RenderedMessage) -> String {
    let mut out = format!(
        r#"<article class="message {}" data-key="{}">"#,
        role_class(message.role),
        html_escape(&message.key)
    );
    if let Some(thinking) = &message.thinking_html {
        out.push_str(&format!(
            r#"<details class="message-reasoning"><summary>Reasoning</summary>{thinking}</details>"#
        ));
    }
    if let Some(html) = &message.html {
        out.push_str(&format!(r#"<div class="message-content">{html}</div>"#));
    }
    if !message.images.is_empty() {
        out.push_str(r#"<div class="message-images">"#);
        for image in &message.images {
            out.push_str(&render_image(image));
        }
        out.push_str("</div>");
    }
    for card in &message.tool_cards {
        out.push_str(&render_tool_card(card));
    }
    out.push_str("</article>\n");
    out
}

fn render_image(image: &ImageBlock) -> String {
    format!(
        r#"<img src="{}" alt="{}" loading="lazy">"#,
        html_escape(&image.url),
        html_escape(image.alt.as_deref().unwrap_or("image"))
    )
}

fn render_tool_card(card: &ToolCardView) -> String {
    let status_class = card.status.map(|s| s.css_class()).unwrap_or("tool-call");
    let kind = match card.kind {
        ToolCardKind::Call => "call",
        ToolCardKind::Result => "result",
    };
    let status_badge = card
        .status
        .map(|s| {
            format!(
                r#"<span class="tool-card-status" title="{label}">{icon}</span>"#,
                label = s.label(),
                icon = status_icon(s)
            )
        })
        .unwrap_or_default();
    let call_id = card
        .tool_call_id
        .as_deref()
        .map(|id| format!(r#" data-tool-call-id="{}""#, html_escape(id)))
        .unwrap_or_default();

    let mut out = format!(
        r#"<div class="tool-card tool-card-{kind} {status_class}"{call_id}><div class="tool-card-header"><span class="tool-card-icon" aria-hidden="true">{icon}</span><span class="tool-card-label">{label}</span>{status_badge}</div>"#,
        icon = icon_svg(card.icon),
        label = html_escape(&card.label),
    );
    if let Some(error) = &card.error {
        out.push_str(&format!(r#"<div class="tool-card-error">{}</div>"#, html_escape(error)));
    }
    let preview = card.preview.as_deref().map(html_escape);
    match (&card.detail_html, preview) {
        (Some(detail), _) if card.inline => {
            out.push_str(&format!(r#"<div class="tool-card-detail">{detail}</div>"#));
        }
        (Some(detail), preview) => {
            out.push_str(&format!(
                r#"<details class="tool-card-collapse"><summary class="tool-card-preview">{}</summary><div class="tool-card-detail">{detail}</div></details>"#,
                preview.unwrap_or_else(|| "Details".to_string())
            ));
        }
        (None, Some(preview)) => {
            out.push_str(&format!(r#"<div class="tool-card-preview">{preview}</div>"#));
        }
        (None, None) => {}
    }
    out.push_str("</div>");
    out
}
