pub mod config;
pub mod extract;
pub mod markdown;
pub mod model;
pub mod normalize;
pub mod render;
pub mod tool_cards;
pub mod transcript;

pub use config::{PipelineConfig, RenderOptions};
pub use markdown::MarkdownPipeline;
pub use model::{CanonicalRole, RawMessage};
pub use render::{RenderedTranscript, TranscriptPipeline};
pub use transcript::{ChatSession, StreamEvent};

use std::fs;
use std::io::{self, BufReader, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use once_cell::sync::Lazy;
use tracing::info;
use tracing_subscriber::EnvFilter;

use render::html::{DocumentOptions, render_document};
use transcript::{LoadedTranscript, load_transcript, read_transcript};

/// Version string with build metadata when available.
static VERSION: Lazy<String> = Lazy::new(|| {
    let mut version = env!("CARGO_PKG_VERSION").to_string();
    if let Some(date) = option_env!("VERGEN_BUILD_DATE") {
        version.push_str(&format!(" (built {date}"));
        if let Some(target) = option_env!("VERGEN_CARGO_TARGET_TRIPLE") {
            version.push_str(&format!(", {target}"));
        }
        version.push(')');
    }
    version
});

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "chat-transcript",
    version = VERSION.as_str(),
    about = "Render chat transcripts into sanitized, grouped HTML"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Standalone HTML page
    Html,
    /// Render units as JSON
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a JSONL transcript
    Render {
        /// Transcript file, or "-" for stdin
        file: PathBuf,

        /// TOML configuration file
        #[arg(long, env = "CHAT_TRANSCRIPT_CONFIG")]
        config: Option<PathBuf>,

        /// Include reasoning blocks
        #[arg(long, default_value_t = false)]
        show_thinking: bool,

        /// Collapse long tool payloads to their preview
        #[arg(long, default_value_t = false)]
        collapse_tools: bool,

        /// Number of most recent messages to render (overrides config)
        #[arg(long)]
        history_limit: Option<NonZeroUsize>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,

        /// Page title for HTML output
        #[arg(long, default_value = "Chat transcript")]
        title: String,

        /// Omit timestamps from HTML output
        #[arg(long, default_value_t = false)]
        no_timestamps: bool,

        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Render {
            file,
            config,
            show_thinking,
            collapse_tools,
            history_limit,
            format,
            title,
            no_timestamps,
            output,
        } => {
            let config = match config {
                Some(path) => PipelineConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            let mut options = config.render_options();
            options.show_thinking = show_thinking;
            options.show_tool_details = !collapse_tools;
            if let Some(limit) = history_limit {
                options.history_limit = limit.get();
            }
            let document = DocumentOptions {
                title,
                show_timestamps: !no_timestamps,
            };
            let rendered = render_file(&file, &config, &options, format, &document)?;
            write_output(output.as_deref(), &rendered)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "chat-transcript", &mut io::stdout());
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(file: &Path) -> Result<LoadedTranscript> {
    if file == Path::new("-") {
        let stdin = io::stdin();
        Ok(read_transcript(BufReader::new(stdin.lock()))?)
    } else {
        Ok(load_transcript(file)?)
    }
}

/// Load, render and serialize one transcript.
pub fn render_file(
    file: &Path,
    config: &PipelineConfig,
    options: &RenderOptions,
    format: OutputFormat,
    document: &DocumentOptions,
) -> Result<String> {
    let loaded = read_input(file)?;
    let mut pipeline = TranscriptPipeline::new(config);
    let transcript = pipeline.render_session(&loaded.session, options);
    info!(
        component = "cli",
        operation = "render",
        skipped_lines = loaded.stats.skipped,
        units = transcript.units.len(),
        format = ?format,
        "Transcript rendered"
    );
    match format {
        OutputFormat::Html => Ok(render_document(&transcript, document)),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&transcript)?;
            json.push('\n');
            Ok(json)
        }
    }
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("writing output {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}
