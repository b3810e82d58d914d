//! Structured logging to stderr.
//!
//! stdout carries the transcript or the NDJSON stream, so every log line goes
//! to stderr. `RUST_LOG` overrides the computed filter.

use crate::config::LoggingConfig;
use crate::error::{PodscribeError, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Effective level after applying `-q` / `-v` on top of the configured one.
pub fn effective_level(configured: &str, quiet: bool, verbose: u8) -> String {
    match (quiet, verbose) {
        (true, _) => "error".to_string(),
        (false, 0) => configured.to_string(),
        (false, 1) => "debug".to_string(),
        (false, _) => "trace".to_string(),
    }
}

/// Filter directive for `level`.
///
/// A bare level applies to this crate only, with dependencies held at
/// `warn`. Anything containing `=` or `,` is used verbatim.
pub fn filter_directive(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("warn,podscribe={level}")
    }
}

/// Install the global subscriber. Fails if one is already installed or the
/// directive does not parse.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let directive = filter_directive(&config.level);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&directive).map_err(|e| PodscribeError::ConfigInvalidValue {
            key: "logging.level".to_string(),
            message: format!("{directive:?}: {e}"),
        })?,
    };

    let (plain, json) = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_list(true);
        (None, Some(layer))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .try_init()
        .map_err(|e| PodscribeError::Other(format!("Failed to initialize logging: {e}")))
}
