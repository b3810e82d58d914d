//! podscribe - podcast audio to text
//!
//! Downloads an episode, cuts it into size-bounded segments with ffmpeg and
//! transcribes them one by one through a remote backend, reporting progress
//! per phase.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod cancel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
#[cfg(feature = "cli")]
pub mod diagnostics;
pub mod download;
pub mod error;
pub mod logging;
pub mod media;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod transcribe;
pub mod workspace;

// Core traits (runner → backend → sink)
pub use media::runner::{CommandRunner, SystemCommandRunner};
pub use progress::{ChannelSink, CollectorSink, NullSink, ProgressSink};
pub use transcribe::TranscriptionBackend;

// Pipeline
pub use cancel::CancelFlag;
pub use pipeline::{Job, JobState, NdjsonTransport, Pipeline, StreamRecord, TranscriptSummary};

// Error handling
pub use error::{ErrorKind, PodscribeError, Result};

// Config
pub use config::{BackendKind, Config};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
