use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use podscribe::cli::{Cli, Commands, ConfigAction, OutputFormat};
use podscribe::config::{BackendKind, Config, LoggingConfig};
use podscribe::diagnostics::check_dependencies;
use podscribe::media::{DurationProber, SystemCommandRunner};
use podscribe::output::{ProgressBars, summary_line};
use podscribe::pipeline::{NdjsonTransport, Pipeline, TranscriptSummary};
use podscribe::progress::progress_channel;
use podscribe::transcribe::build_backend;
use podscribe::{CancelFlag, logging};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Options of the `transcribe` command that override configuration.
struct TranscribeArgs {
    url: String,
    format: OutputFormat,
    output: Option<PathBuf>,
    backend: Option<BackendKind>,
    model: Option<String>,
    max_segment_mb: Option<u64>,
    timeout: Option<Duration>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Transcribe {
            url,
            format,
            output,
            backend,
            model,
            max_segment_mb,
            timeout,
        } => {
            let args = TranscribeArgs {
                url,
                format,
                output,
                backend,
                model,
                max_segment_mb,
                timeout,
            };
            let config = load_config(cli.config.as_deref(), args.backend)?;
            init_logging(&config, cli.quiet, cli.verbose, cli.log_json);
            run_transcribe(config, args, cli.quiet).await
        }
        Commands::Probe { file } => {
            let config = load_config(cli.config.as_deref(), None)?;
            init_logging(&config, cli.quiet, cli.verbose, cli.log_json);
            let runner = Arc::new(SystemCommandRunner::new(Duration::from_secs(
                config.segment.tool_timeout_secs,
            )));
            let duration = DurationProber::new(runner, &config.segment.ffprobe)
                .probe(&file)
                .await?;
            let rounded = Duration::from_millis((duration * 1000.0).round() as u64);
            println!("{duration:.3}s ({})", humantime::format_duration(rounded));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref(), None)?;
            init_logging(&config, cli.quiet, cli.verbose, cli.log_json);
            Ok(if check_dependencies(&config) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "podscribe",
                &mut std::io::stdout(),
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load configuration: file, then environment, with a command-line backend
/// taking precedence over both.
fn load_config(custom_path: Option<&Path>, backend: Option<BackendKind>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides_for(backend))
}

fn init_logging(config: &Config, quiet: bool, verbose: u8, json: bool) {
    let logging_config = LoggingConfig {
        level: logging::effective_level(&config.logging.level, quiet, verbose),
        json: config.logging.json || json,
    };
    if let Err(e) = logging::init_logging(&logging_config) {
        eprintln!("podscribe: {e}");
    }
}

fn apply_overrides(config: &mut Config, args: &TranscribeArgs) {
    if let Some(model) = &args.model {
        config.transcribe.model = Some(model.clone());
    }
    if let Some(mib) = args.max_segment_mb {
        config.segment.max_segment_bytes = mib.saturating_mul(1024 * 1024);
    }
    if let Some(timeout) = args.timeout {
        let secs = timeout.as_secs().max(1);
        config.download.timeout_secs = secs;
        config.transcribe.timeout_secs = secs;
    }
}

fn build_pipeline(config: &Config) -> podscribe::Result<Pipeline> {
    config.validate()?;
    // Fails on a missing API key before anything is downloaded.
    let backend = build_backend(&config.transcribe)?;
    let runner = Arc::new(SystemCommandRunner::new(Duration::from_secs(
        config.segment.tool_timeout_secs,
    )));
    Pipeline::from_config(config, runner, backend)
}

async fn run_transcribe(mut config: Config, args: TranscribeArgs, quiet: bool) -> Result<ExitCode> {
    apply_overrides(&mut config, &args);

    let cancel = CancelFlag::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current step");
            interrupt.cancel();
        }
    });

    match args.format {
        OutputFormat::Ndjson => {
            let (mut sink, rx) = progress_channel(config.progress.buffer);
            let transport = NdjsonTransport::start(std::io::stdout(), rx);
            let result = match build_pipeline(&config) {
                Ok(pipeline) => pipeline.run(&args.url, &mut sink, &cancel).await,
                Err(e) => Err(e),
            };
            if let Err(e) = transport.finish(&result) {
                tracing::warn!(error = %e, "failed to write result stream");
            }
            Ok(exit_code(&result))
        }
        OutputFormat::Text => {
            let pipeline = build_pipeline(&config)?;
            let mut bars = ProgressBars::new(!quiet && std::io::stderr().is_terminal());
            let result = pipeline.run(&args.url, &mut bars, &cancel).await;
            bars.finish();

            let summary = match result {
                Ok(summary) => summary,
                Err(e) => {
                    eprintln!("{} {e}", "error:".red().bold());
                    return Ok(ExitCode::FAILURE);
                }
            };

            write_transcript(&summary, args.output.as_deref())?;
            if !quiet {
                eprintln!("{}", summary_line(&summary).dimmed());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn write_transcript(summary: &TranscriptSummary, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, format!("{}\n", summary.text))
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", summary.text)?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn exit_code(result: &podscribe::Result<TranscriptSummary>) -> ExitCode {
    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path, None)?;
            print!("{}", config.to_display_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Dump => {
            print!("{}", Config::template());
        }
    }
    Ok(())
}
