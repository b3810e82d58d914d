//! Size-bounded segmentation of a downloaded source.
//!
//! The source is first cut into `ceil(total_bytes / max_segment_bytes)`
//! equal-duration slices. Slicing by time assumes a roughly constant bitrate,
//! so any extracted file that still exceeds the ceiling is split again from
//! the extracted file itself, and its pieces take its place in the output.
//! Re-splitting is bounded by `max_split_depth`.

use crate::defaults;
use crate::error::{PodscribeError, Result};
use crate::media::runner::CommandRunner;
use crate::progress::percent;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A planned time range, relative to the file it will be cut from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slice {
    pub start: f64,
    pub duration: f64,
}

/// Equal-duration slices for a file of `duration` seconds and `total_bytes`.
///
/// Produces `ceil(total_bytes / max_bytes)` slices (at least one). Returns no
/// slices for a non-positive duration or a zero ceiling.
pub fn plan_slices(duration: f64, total_bytes: u64, max_bytes: u64) -> Vec<Slice> {
    if !(duration.is_finite() && duration > 0.0) || max_bytes == 0 {
        return Vec::new();
    }
    let count = total_bytes.div_ceil(max_bytes).max(1);
    (0..count)
        .map(|i| {
            let start = duration * i as f64 / count as f64;
            let end = duration * (i + 1) as f64 / count as f64;
            Slice {
                start,
                duration: end - start,
            }
        })
        .collect()
}

/// One extracted segment file, in assembly order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Position in the transcript. Contiguous from 0.
    pub index: usize,
    /// Offset into the source, in seconds.
    pub start_secs: f64,
    pub duration_secs: f64,
    pub bytes: u64,
    pub path: PathBuf,
}

/// Pending extraction inside one top-level slice.
#[derive(Debug)]
struct Piece {
    source: PathBuf,
    offset: f64,
    abs_start: f64,
    duration: f64,
    stem: String,
    depth: u32,
}

/// Cuts a source file into ordered segments no larger than the ceiling.
pub struct Segmenter {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
    max_segment_bytes: u64,
    max_split_depth: u32,
}

impl Segmenter {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        ffmpeg: impl Into<String>,
        max_segment_bytes: u64,
    ) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            max_segment_bytes,
            max_split_depth: defaults::MAX_SPLIT_DEPTH,
        }
    }

    pub fn with_max_split_depth(mut self, depth: u32) -> Self {
        self.max_split_depth = depth;
        self
    }

    /// Split `source` into segment files under `out_dir`.
    ///
    /// `on_progress` receives the percentage of top-level slices completed.
    /// Any extraction failure, an empty output file, or a piece that is still
    /// too large at the depth cap fails with `SegmentFailed`.
    pub async fn segment(
        &self,
        source: &Path,
        duration: f64,
        total_bytes: u64,
        out_dir: &Path,
        mut on_progress: impl FnMut(u8) + Send,
    ) -> Result<Vec<Segment>> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(PodscribeError::ProbeFailed {
                path: source.display().to_string(),
                message: format!("cannot segment a source of duration {duration}"),
            });
        }
        if self.max_segment_bytes == 0 {
            return Err(PodscribeError::ConfigInvalidValue {
                key: "segment.max_segment_bytes".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(defaults::DEFAULT_EXTENSION)
            .to_string();
        let plan = plan_slices(duration, total_bytes, self.max_segment_bytes);
        let total = plan.len();
        tracing::info!(
            slices = total,
            duration_secs = duration,
            total_bytes,
            max_segment_bytes = self.max_segment_bytes,
            "segmenting"
        );

        let mut segments = Vec::with_capacity(total);
        for (i, slice) in plan.iter().enumerate() {
            let mut work = VecDeque::from([Piece {
                source: source.to_path_buf(),
                offset: slice.start,
                abs_start: slice.start,
                duration: slice.duration,
                stem: format!("segment_{i:03}"),
                depth: 0,
            }]);
            let mut oversized = Vec::new();

            while let Some(piece) = work.pop_front() {
                let path = out_dir.join(format!("{}.{ext}", piece.stem));
                let bytes = self.extract(&piece, &path).await?;

                if bytes <= self.max_segment_bytes {
                    segments.push(Segment {
                        index: segments.len(),
                        start_secs: piece.abs_start,
                        duration_secs: piece.duration,
                        bytes,
                        path,
                    });
                    continue;
                }

                if piece.depth >= self.max_split_depth {
                    return Err(PodscribeError::SegmentFailed {
                        message: format!(
                            "{} is {bytes} bytes after {} re-splits (ceiling {})",
                            path.display(),
                            piece.depth,
                            self.max_segment_bytes
                        ),
                    });
                }

                let children = plan_slices(piece.duration, bytes, self.max_segment_bytes);
                tracing::debug!(
                    file = %path.display(),
                    bytes,
                    pieces = children.len(),
                    depth = piece.depth + 1,
                    "re-splitting oversized segment"
                );
                for (j, child) in children.iter().enumerate().rev() {
                    work.push_front(Piece {
                        source: path.clone(),
                        offset: child.start,
                        abs_start: piece.abs_start + child.start,
                        duration: child.duration,
                        stem: format!("{}_{j}", piece.stem),
                        depth: piece.depth + 1,
                    });
                }
                oversized.push(path);
            }

            for path in oversized {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(file = %path.display(), error = %e, "failed to remove oversized segment");
                }
            }

            on_progress(percent(i + 1, total));
        }

        Ok(segments)
    }

    /// Cut one piece to `dest` and return the resulting file size.
    async fn extract(&self, piece: &Piece, dest: &Path) -> Result<u64> {
        let args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", piece.offset),
            "-t".to_string(),
            format!("{:.3}", piece.duration),
            "-i".to_string(),
            piece.source.display().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "copy".to_string(),
            dest.display().to_string(),
        ];

        self.runner
            .run(&self.ffmpeg, &args)
            .await
            .map_err(|e| PodscribeError::SegmentFailed {
                message: format!("extracting {}: {e}", dest.display()),
            })?;

        let bytes = tokio::fs::metadata(dest)
            .await
            .map_err(|e| PodscribeError::SegmentFailed {
                message: format!("{} was not written: {e}", dest.display()),
            })?
            .len();
        if bytes == 0 {
            return Err(PodscribeError::SegmentFailed {
                message: format!("{} is empty", dest.display()),
            });
        }
        Ok(bytes)
    }
}
