//! Pipeline configuration.
//!
//! Loaded from TOML; every field has a default so an empty file (or no file
//! at all) yields a working configuration.
//!
//! ```toml
//! history_limit = 100
//! extraction_cache_entries = 256
//!
//! [markdown]
//! char_limit = 140000
//! parse_limit = 40000
//!
//! [tool_preview]
//! max_lines = 2
//! max_chars = 100
//! ```

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::markdown::MarkdownLimits;

pub const DEFAULT_HISTORY_LIMIT: usize = 200;
pub const DEFAULT_EXTRACTION_CACHE_ENTRIES: usize = 512;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Ceilings for compact tool output previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPreviewLimits {
    pub max_lines: usize,
    pub max_chars: usize,
    /// Output at or below this many characters is always shown inline.
    pub inline_threshold: usize,
}

impl Default for ToolPreviewLimits {
    fn default() -> Self {
        Self {
            max_lines: 2,
            max_chars: 100,
            inline_threshold: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub markdown: MarkdownLimits,
    pub tool_preview: ToolPreviewLimits,
    pub extraction_cache_entries: usize,
    pub history_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            markdown: MarkdownLimits::default(),
            tool_preview: ToolPreviewLimits::default(),
            extraction_cache_entries: DEFAULT_EXTRACTION_CACHE_ENTRIES,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a file path.
    ///
    /// If path is "-", reads from stdin.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = if path == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(path)?
        };
        Self::from_toml_str(&content)
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let md = &self.markdown;
        let non_zero = [
            ("markdown.char_limit", md.char_limit),
            ("markdown.parse_limit", md.parse_limit),
            ("markdown.cache_entries", md.cache_entries),
            ("tool_preview.max_lines", self.tool_preview.max_lines),
            ("tool_preview.max_chars", self.tool_preview.max_chars),
            ("extraction_cache_entries", self.extraction_cache_entries),
            ("history_limit", self.history_limit),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Validation(format!("{name} must be greater than zero")));
        }
        if md.parse_limit > md.char_limit {
            return Err(ConfigError::Validation(format!(
                "markdown.parse_limit ({}) must not exceed markdown.char_limit ({})",
                md.parse_limit, md.char_limit
            )));
        }
        Ok(())
    }

    /// Per-call options seeded from this configuration.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            history_limit: self.history_limit,
            ..RenderOptions::default()
        }
    }
}

/// Host-controlled switches passed with each render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Include reasoning text in rendered messages.
    pub show_thinking: bool,
    /// Show tool output inline instead of collapsed.
    pub show_tool_details: bool,
    pub history_limit: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_thinking: false,
            show_tool_details: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.markdown.char_limit, 140_000);
        assert_eq!(config.markdown.parse_limit, 40_000);
        assert_eq!(config.markdown.cache_max_chars, 50_000);
        assert_eq!(config.markdown.cache_entries, 200);
        assert_eq!(config.tool_preview.max_lines, 2);
        assert_eq!(config.tool_preview.max_chars, 100);
        assert_eq!(config.history_limit, 200);
    }

    #[test]
    fn partial_tables_merge_with_defaults() {
        let config = PipelineConfig::from_toml_str(
            "history_limit = 50\n[markdown]\ncache_entries = 8\n",
        )
        .unwrap();
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.markdown.cache_entries, 8);
        assert_eq!(config.markdown.char_limit, 140_000);
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = PipelineConfig::from_toml_str("[markdown]\ncache_entries = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("cache_entries")));
    }

    #[test]
    fn rejects_parse_limit_above_char_limit() {
        let err = PipelineConfig::from_toml_str("[markdown]\nchar_limit = 10\nparse_limit = 20\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = PipelineConfig::from_toml_str("history_limit = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tool_preview]\nmax_chars = 40").unwrap();
        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.tool_preview.max_chars, 40);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PipelineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(_)));
    }

    #[test]
    fn render_options_follow_history_limit() {
        let config = PipelineConfig {
            history_limit: 7,
            ..PipelineConfig::default()
        };
        let opts = config.render_options();
        assert_eq!(opts.history_limit, 7);
        assert!(!opts.show_thinking);
    }
}
