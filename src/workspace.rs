//! Per-job temporary directory.
//!
//! A [`Workspace`] owns every intermediate file of one job: the downloaded
//! source and all segment files. Dropping it removes the directory; calling
//! [`Workspace::cleanup`] does the same eagerly and reports failures.

use crate::error::{PodscribeError, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Exclusive scratch directory for a single job.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("podscribe-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| PodscribeError::Workspace {
                    message: format!("Failed to create {}: {e}", root.display()),
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| PodscribeError::Workspace {
            message: format!("Failed to create temporary directory: {e}"),
        })?;

        let path = dir.path().to_path_buf();
        tracing::debug!(workspace = %path.display(), "workspace created");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Directory holding this job's files.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a file named `name` inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Whether the directory has not been cleaned up yet.
    pub fn is_active(&self) -> bool {
        self.dir.is_some()
    }

    /// Remove all files and the directory itself.
    ///
    /// Idempotent: a second call is a no-op.
    pub fn cleanup(&mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        dir.close().map_err(|e| PodscribeError::Workspace {
            message: format!("Failed to remove {}: {e}", self.path.display()),
        })?;
        tracing::debug!(workspace = %self.path.display(), "workspace removed");
        Ok(())
    }
}
