//! Process boundary for ffmpeg and ffprobe.
//!
//! The `CommandRunner` trait lets probing and segmentation run against the
//! real tools or against [`SyntheticMedia`](crate::media::synthetic::SyntheticMedia)
//! in tests.

use crate::error::{PodscribeError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Trait for executing external media tools.
///
/// Object-safe, Send + Sync for use across jobs.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`.
    ///
    /// Returns stdout on success. Returns `ToolNotFound` if the program is
    /// missing and `ToolFailed` on a non-zero exit or timeout.
    async fn run(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Production runner using `tokio::process::Command`.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::defaults::TOOL_TIMEOUT_SECS))
    }
}

#[async_trait::async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String> {
        tracing::trace!(program, ?args, "running tool");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PodscribeError::ToolNotFound {
                    tool: program.to_string(),
                });
            }
            Ok(Err(e)) => {
                return Err(PodscribeError::ToolFailed {
                    tool: program.to_string(),
                    message: format!("failed to execute: {e}"),
                });
            }
            Err(_) => {
                return Err(PodscribeError::ToolFailed {
                    tool: program.to_string(),
                    message: format!("timed out after {}s", self.timeout.as_secs()),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PodscribeError::ToolFailed {
                tool: program.to_string(),
                message: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
