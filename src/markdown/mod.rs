//! Markdown to sanitized HTML.
//!
//! `input -> cache check -> size guard -> render -> sanitize -> cache store`.
//!
//! Oversized input is truncated with a visible note; input that is still too
//! large to parse cheaply is shown as an escaped preformatted block instead of
//! being handed to the markdown parser. Every path ends in the sanitizer.

pub mod cache;
pub mod escape;
pub mod highlight;
pub mod render;
pub mod sanitize;

use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use cache::MarkdownCache;
pub use escape::html_escape;
pub use highlight::{Token, highlight, tokenize};
pub use render::{RenderError, render_markdown};
pub use sanitize::{AllowList, AmmoniaSanitizer, COPY_BUTTON_HOOK, Sanitizer};

pub const DEFAULT_CHAR_LIMIT: usize = 140_000;
pub const DEFAULT_PARSE_LIMIT: usize = 40_000;
pub const DEFAULT_CACHE_MAX_CHARS: usize = 50_000;
pub const DEFAULT_CACHE_ENTRIES: usize = 200;
pub const DEFAULT_HIGHLIGHT_MAX_CHARS: usize = 20_000;

/// Size ceilings for markdown conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownLimits {
    /// Input beyond this many characters is truncated.
    pub char_limit: usize,
    /// Input beyond this many characters skips markdown parsing.
    pub parse_limit: usize,
    /// Largest input stored in the cache.
    pub cache_max_chars: usize,
    pub cache_entries: usize,
    /// Code blocks larger than this are escaped but not highlighted.
    pub highlight_max_chars: usize,
}

impl Default for MarkdownLimits {
    fn default() -> Self {
        Self {
            char_limit: DEFAULT_CHAR_LIMIT,
            parse_limit: DEFAULT_PARSE_LIMIT,
            cache_max_chars: DEFAULT_CACHE_MAX_CHARS,
            cache_entries: DEFAULT_CACHE_ENTRIES,
            highlight_max_chars: DEFAULT_HIGHLIGHT_MAX_CHARS,
        }
    }
}

/// Note appended to truncated input.
pub fn truncation_note(total_chars: usize, shown_chars: usize) -> String {
    format!("\n\n… truncated ({total_chars} chars, showing first {shown_chars}).")
}

/// Owns the sanitizer and the output cache for one transcript view.
pub struct MarkdownPipeline {
    cache: MarkdownCache,
    sanitizer: Box<dyn Sanitizer>,
    limits: MarkdownLimits,
}

impl MarkdownPipeline {
    pub fn new(limits: MarkdownLimits) -> Self {
        Self::with_sanitizer(limits, Box::new(AmmoniaSanitizer::new()))
    }

    pub fn with_sanitizer(limits: MarkdownLimits, sanitizer: Box<dyn Sanitizer>) -> Self {
        let capacity = NonZeroUsize::new(limits.cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: MarkdownCache::new(capacity, limits.cache_max_chars),
            sanitizer,
            limits,
        }
    }

    pub fn limits(&self) -> &MarkdownLimits {
        &self.limits
    }

    pub fn cache(&self) -> &MarkdownCache {
        &self.cache
    }

    /// Convert `markdown` to safe HTML, consulting and filling the cache.
    ///
    /// A cache hit returns exactly the bytes produced by the cold conversion.
    pub fn to_safe_html(&mut self, markdown: &str) -> String {
        let input = markdown.trim();
        if input.is_empty() {
            return String::new();
        }
        if let Some(hit) = self.cache.get(input) {
            trace!(
                component = "markdown",
                operation = "cache_hit",
                input_len = input.len(),
                "Markdown cache hit"
            );
            return hit.clone();
        }

        let html = self.convert(input);
        if self.cache.is_eligible(input) {
            self.cache.insert(input, html.clone());
        } else {
            debug!(
                component = "markdown",
                operation = "cache_skip",
                input_len = input.len(),
                cache_max_chars = self.limits.cache_max_chars,
                "Input too large to cache"
            );
        }
        html
    }

    /// Convert without touching the cache. Used for in-progress stream text.
    pub fn to_safe_html_uncached(&self, markdown: &str) -> String {
        let input = markdown.trim();
        if input.is_empty() {
            return String::new();
        }
        self.convert(input)
    }

    fn convert(&self, input: &str) -> String {
        let started = Instant::now();
        let source = self.apply_char_limit(input);

        let rendered = if exceeds_chars(&source, self.limits.parse_limit) {
            debug!(
                component = "markdown",
                operation = "plain_fallback",
                input_len = source.len(),
                parse_limit = self.limits.parse_limit,
                "Input too large to parse; rendering as preformatted text"
            );
            format!(r#"<pre class="code-block">{}</pre>"#, html_escape(&source))
        } else {
            render_markdown(&source, self.limits.highlight_max_chars)
        };

        let html = self.sanitizer.sanitize(&rendered);
        trace!(
            component = "markdown",
            operation = "convert",
            input_len = input.len(),
            output_len = html.len(),
            duration_ms = started.elapsed().as_millis(),
            "Converted markdown"
        );
        html
    }

    fn apply_char_limit<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let limit = self.limits.char_limit;
        if !exceeds_chars(input, limit) {
            return Cow::Borrowed(input);
        }
        let total = input.chars().count();
        let cut = input
            .char_indices()
            .nth(limit)
            .map(|(idx, _)| idx)
            .unwrap_or(input.len());
        debug!(
            component = "markdown",
            operation = "truncate",
            total_chars = total,
            shown_chars = limit,
            "Truncating oversized markdown"
        );
        let mut out = String::with_capacity(cut + 64);
        out.push_str(&input[..cut]);
        out.push_str(&truncation_note(total, limit));
        Cow::Owned(out)
    }
}

impl Default for MarkdownPipeline {
    fn default() -> Self {
        Self::new(MarkdownLimits::default())
    }
}

fn exceeds_chars(text: &str, limit: usize) -> bool {
    text.len() > limit && text.chars().count() > limit
}
