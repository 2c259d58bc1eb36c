//! Restricted markdown to HTML renderer.
//!
//! Only a fixed set of block and inline constructs produce markup. Raw HTML
//! in the source is emitted as escaped text, images collapse to their alt
//! text, and every text node is escaped before insertion. The event stream is
//! split into top-level blocks and each block is rendered on its own; a block
//! that fails to render is replaced by an empty element and the rest of the
//! document is unaffected.

use std::fmt::Write as _;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use thiserror::Error;
use tracing::{trace, warn};

use super::escape::{html_escape, push_escaped};
use super::highlight::highlight;
use super::sanitize::COPY_BUTTON_HOOK;

/// Placeholder emitted in place of a block that could not be rendered.
pub const EMPTY_BLOCK: &str = "<div></div>";

/// Errors raised while rendering a single top-level block.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("end of {found} while {expected} was open")]
    Mismatched {
        expected: &'static str,
        found: &'static str,
    },
    #[error("end of {0} without a matching start")]
    UnmatchedEnd(&'static str),
    #[error("{0} left open at end of block")]
    Unclosed(&'static str),
    #[error("failed to write markup: {0}")]
    Write(#[from] std::fmt::Error),
}

fn markdown_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts
}

/// Render markdown `source` to (unsanitized) HTML.
pub fn render_markdown(source: &str, highlight_max_chars: usize) -> String {
    render_events(Parser::new_ext(source, markdown_options()), highlight_max_chars)
}

/// Render an arbitrary event stream, one top-level block at a time.
pub fn render_events<'a, I>(events: I, highlight_max_chars: usize) -> String
where
    I: IntoIterator<Item = Event<'a>>,
{
    let mut out = String::new();
    let mut block: Vec<Event<'a>> = Vec::new();
    let mut depth = 0usize;
    let mut index = 0usize;

    for event in events {
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
        block.push(event);
        if depth == 0 {
            flush_block(&mut out, &block, index, highlight_max_chars);
            block.clear();
            index += 1;
        }
    }
    if !block.is_empty() {
        flush_block(&mut out, &block, index, highlight_max_chars);
    }
    out
}

fn flush_block(out: &mut String, events: &[Event<'_>], index: usize, highlight_max_chars: usize) {
    match render_block(events, highlight_max_chars) {
        Ok(html) => {
            trace!(
                component = "markdown_render",
                operation = "render_block",
                block = index,
                events = events.len(),
                bytes = html.len(),
                "Rendered block"
            );
            out.push_str(&html);
        }
        Err(err) => {
            warn!(
                component = "markdown_render",
                operation = "render_block",
                block = index,
                error = %err,
                "Degrading malformed markdown block"
            );
            out.push_str(EMPTY_BLOCK);
        }
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Render one top-level block.
pub fn render_block(events: &[Event<'_>], highlight_max_chars: usize) -> Result<String, RenderError> {
    let mut writer = BlockWriter::new(highlight_max_chars);
    for event in events {
        writer.event(event)?;
    }
    writer.finish()
}

struct CodeBuffer {
    language: String,
    code: String,
}

struct BlockWriter {
    out: String,
    open: Vec<&'static str>,
    code: Option<CodeBuffer>,
    alignments: Vec<Alignment>,
    cell_index: usize,
    in_table_head: bool,
    highlight_max_chars: usize,
}

impl BlockWriter {
    fn new(highlight_max_chars: usize) -> Self {
        Self {
            out: String::new(),
            open: Vec::new(),
            code: None,
            alignments: Vec::new(),
            cell_index: 0,
            in_table_head: false,
            highlight_max_chars,
        }
    }

    fn finish(self) -> Result<String, RenderError> {
        if let Some(open) = self.open.last() {
            return Err(RenderError::Unclosed(*open));
        }
        Ok(self.out)
    }

    fn event(&mut self, event: &Event<'_>) -> Result<(), RenderError> {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                match self.code.as_mut() {
                    Some(buffer) => buffer.code.push_str(text),
                    None => push_escaped(&mut self.out, text),
                }
                Ok(())
            }
            Event::Code(code) => {
                self.out.push_str("<code>");
                push_escaped(&mut self.out, code);
                self.out.push_str("</code>");
                Ok(())
            }
            Event::Html(raw) | Event::InlineHtml(raw) => {
                push_escaped(&mut self.out, raw);
                Ok(())
            }
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                push_escaped(&mut self.out, math);
                Ok(())
            }
            Event::FootnoteReference(name) => {
                write!(self.out, "[{}]", html_escape(name))?;
                Ok(())
            }
            Event::SoftBreak => {
                self.out.push('\n');
                Ok(())
            }
            Event::HardBreak => {
                self.out.push_str("<br>\n");
                Ok(())
            }
            Event::Rule => {
                self.out.push_str("<hr>");
                Ok(())
            }
            Event::TaskListMarker(checked) => {
                self.out.push_str(if *checked { "[x] " } else { "[ ] " });
                Ok(())
            }
        }
    }

    fn start(&mut self, tag: &Tag<'_>) -> Result<(), RenderError> {
        let name = open_name(tag);
        match tag {
            Tag::Paragraph => self.out.push_str("<p>"),
            Tag::Heading { level, .. } => write!(self.out, "<h{}>", heading_number(*level))?,
            Tag::BlockQuote(_) => self.out.push_str("<blockquote>"),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => code_language(info),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeBuffer {
                    language,
                    code: String::new(),
                });
            }
            Tag::HtmlBlock => self.out.push_str("<p>"),
            Tag::List(Some(1)) => self.out.push_str("<ol>"),
            Tag::List(Some(start)) => write!(self.out, r#"<ol start="{start}">"#)?,
            Tag::List(None) => self.out.push_str("<ul>"),
            Tag::Item => self.out.push_str("<li>"),
            Tag::Table(alignments) => {
                self.alignments = alignments.clone();
                self.out.push_str("<table>");
            }
            Tag::TableHead => {
                self.in_table_head = true;
                self.cell_index = 0;
                self.out.push_str("<thead><tr>");
            }
            Tag::TableRow => {
                self.cell_index = 0;
                self.out.push_str("<tr>");
            }
            Tag::TableCell => {
                let cell = if self.in_table_head { "th" } else { "td" };
                match self.alignments.get(self.cell_index).and_then(|a| align_value(*a)) {
                    Some(align) => write!(self.out, r#"<{cell} align="{align}">"#)?,
                    None => write!(self.out, "<{cell}>")?,
                }
            }
            Tag::Emphasis => self.out.push_str("<em>"),
            Tag::Strong => self.out.push_str("<strong>"),
            Tag::Strikethrough => self.out.push_str("<del>"),
            Tag::Link {
                dest_url, title, ..
            } => {
                self.out.push_str(r#"<a href=""#);
                push_escaped(&mut self.out, dest_url);
                self.out.push('"');
                if !title.is_empty() {
                    self.out.push_str(r#" title=""#);
                    push_escaped(&mut self.out, title);
                    self.out.push('"');
                }
                self.out.push('>');
            }
            // Alt text flows through as ordinary escaped text.
            Tag::Image { .. } => {}
            _ => {}
        }
        self.open.push(name);
        Ok(())
    }

    fn end(&mut self, tag: &TagEnd) -> Result<(), RenderError> {
        let found = close_name(tag);
        let expected = self.open.pop().ok_or(RenderError::UnmatchedEnd(found))?;
        if expected != found {
            return Err(RenderError::Mismatched { expected, found });
        }
        match tag {
            TagEnd::Paragraph | TagEnd::HtmlBlock => self.out.push_str("</p>\n"),
            TagEnd::Heading(level) => writeln!(self.out, "</h{}>", heading_number(*level))?,
            TagEnd::BlockQuote(_) => self.out.push_str("</blockquote>\n"),
            TagEnd::CodeBlock => {
                if let Some(buffer) = self.code.take() {
                    self.write_code_block(&buffer)?;
                }
            }
            TagEnd::List(true) => self.out.push_str("</ol>\n"),
            TagEnd::List(false) => self.out.push_str("</ul>\n"),
            TagEnd::Item => self.out.push_str("</li>\n"),
            TagEnd::Table => self.out.push_str("</tbody></table>\n"),
            TagEnd::TableHead => {
                self.in_table_head = false;
                self.out.push_str("</tr></thead><tbody>\n");
            }
            TagEnd::TableRow => self.out.push_str("</tr>\n"),
            TagEnd::TableCell => {
                self.out
                    .push_str(if self.in_table_head { "</th>" } else { "</td>" });
                self.cell_index += 1;
            }
            TagEnd::Emphasis => self.out.push_str("</em>"),
            TagEnd::Strong => self.out.push_str("</strong>"),
            TagEnd::Strikethrough => self.out.push_str("</del>"),
            TagEnd::Link => self.out.push_str("</a>"),
            _ => {}
        }
        Ok(())
    }

    fn write_code_block(&mut self, buffer: &CodeBuffer) -> Result<(), RenderError> {
        let language = buffer.language.as_str();
        self.out.push_str(r#"<div class="code-block-wrapper"><div class="code-block-header">"#);
        if !language.is_empty() {
            write!(self.out, r#"<span class="code-block-lang">{language}</span>"#)?;
        }
        self.out.push_str(
            r#"<button type="button" class="code-block-copy" aria-label="Copy code" data-code=""#,
        );
        push_escaped(&mut self.out, &buffer.code);
        write!(self.out, r#"" onclick="{COPY_BUTTON_HOOK}">Copy</button></div><pre><code"#)?;
        if !language.is_empty() {
            write!(self.out, r#" class="language-{language}""#)?;
        }
        self.out.push('>');
        self.out
            .push_str(&highlight(&buffer.code, language, self.highlight_max_chars));
        self.out.push_str("</code></pre></div>\n");
        Ok(())
    }
}

/// First word of a fence info string, restricted to characters safe in a
/// class name.
fn code_language(info: &str) -> String {
    info.split_whitespace()
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#'))
        .collect::<String>()
        .to_ascii_lowercase()
}

fn heading_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn align_value(alignment: Alignment) -> Option<&'static str> {
    match alignment {
        Alignment::None => None,
        Alignment::Left => Some("left"),
        Alignment::Center => Some("center"),
        Alignment::Right => Some("right"),
    }
}

fn open_name(tag: &Tag<'_>) -> &'static str {
    match tag {
        Tag::Paragraph => "paragraph",
        Tag::Heading { .. } => "heading",
        Tag::BlockQuote(_) => "blockquote",
        Tag::CodeBlock(_) => "code block",
        Tag::HtmlBlock => "html block",
        Tag::List(Some(_)) => "ordered list",
        Tag::List(None) => "list",
        Tag::Item => "item",
        Tag::Table(_) => "table",
        Tag::TableHead => "table head",
        Tag::TableRow => "table row",
        Tag::TableCell => "table cell",
        Tag::Emphasis => "emphasis",
        Tag::Strong => "strong",
        Tag::Strikethrough => "strikethrough",
        Tag::Link { .. } => "link",
        Tag::Image { .. } => "image",
        _ => "other",
    }
}

fn close_name(tag: &TagEnd) -> &'static str {
    match tag {
        TagEnd::Paragraph => "paragraph",
        TagEnd::Heading(_) => "heading",
        TagEnd::BlockQuote(_) => "blockquote",
        TagEnd::CodeBlock => "code block",
        TagEnd::HtmlBlock => "html block",
        TagEnd::List(true) => "ordered list",
        TagEnd::List(false) => "list",
        TagEnd::Item => "item",
        TagEnd::Table => "table",
        TagEnd::TableHead => "table head",
        TagEnd::TableRow => "table row",
        TagEnd::TableCell => "table cell",
        TagEnd::Emphasis => "emphasis",
        TagEnd::Strong => "strong",
        TagEnd::Strikethrough => "strikethrough",
        TagEnd::Link => "link",
        TagEnd::Image => "image",
        _ => "other",
    }
}
