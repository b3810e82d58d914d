//! Command-line interface for podscribe
//!
//! Provides argument parsing using clap derive macros.

use crate::config::BackendKind;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Download, segment and transcribe podcast episodes
#[derive(Parser, Debug)]
#[command(name = "podscribe", version, about = "Download, segment and transcribe podcast episodes")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors and hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// How the transcribe command reports results
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Progress bars on stderr, transcript on stdout
    #[default]
    Text,
    /// One JSON record per line on stdout
    Ndjson,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe the audio at a URL
    Transcribe {
        /// HTTP(S) URL of the audio file
        url: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the transcript to a file instead of stdout (text format only)
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,

        /// Transcription backend (openai, gemini)
        #[arg(long, value_name = "BACKEND", value_parser = parse_backend)]
        backend: Option<BackendKind>,

        /// Backend model name
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,

        /// Segment size ceiling in MiB
        #[arg(long, value_name = "MIB", value_parser = clap::value_parser!(u64).range(1..))]
        max_segment_mb: Option<u64>,

        /// Per-request timeout for download and transcription. Examples: 90, 30s, 5m
        #[arg(long, value_name = "DURATION", value_parser = parse_timeout)]
        timeout: Option<Duration>,
    },

    /// Print the duration of a local audio file
    Probe {
        /// Audio file
        file: PathBuf,
    },

    /// Check system dependencies and credentials
    Check,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show the effective configuration (API key masked)
    Show,
    /// Print the configuration file path
    Path,
    /// Dump a commented configuration template
    Dump,
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
    s.parse::<BackendKind>().map_err(|e| e.to_string())
}

/// Parse a timeout string.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `5m`) and compound (`1m30s`).
fn parse_timeout(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    let duration = match s.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(s).map_err(|e| e.to_string())?,
    };
    if duration.is_zero() {
        return Err("timeout must be positive".to_string());
    }
    Ok(duration)
}
