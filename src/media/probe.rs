//! Playable-duration lookup via ffprobe.

use crate::error::{PodscribeError, Result};
use crate::media::runner::CommandRunner;
use std::path::Path;
use std::sync::Arc;

/// Reads the container duration of a local audio file.
pub struct DurationProber {
    runner: Arc<dyn CommandRunner>,
    ffprobe: String,
}

impl DurationProber {
    pub fn new(runner: Arc<dyn CommandRunner>, ffprobe: impl Into<String>) -> Self {
        Self {
            runner,
            ffprobe: ffprobe.into(),
        }
    }

    /// Duration of `path` in seconds.
    ///
    /// Fails with `ProbeFailed` when the tool errors, prints no number, or
    /// reports a duration that is not strictly positive.
    pub async fn probe(&self, path: &Path) -> Result<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.display().to_string(),
        ];

        let failed = |message: String| PodscribeError::ProbeFailed {
            path: path.display().to_string(),
            message,
        };

        let stdout = self
            .runner
            .run(&self.ffprobe, &args)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let duration = parse_duration(&stdout).ok_or_else(|| {
            failed(format!(
                "no duration reported (ffprobe printed {:?})",
                stdout.trim()
            ))
        })?;

        if !duration.is_finite() || duration <= 0.0 {
            return Err(failed(format!("unusable duration {duration}")));
        }

        tracing::debug!(path = %path.display(), duration_secs = duration, "probed duration");
        Ok(duration)
    }
}

/// First line of ffprobe output that parses as a number.
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find_map(|line| line.parse::<f64>().ok())
}
