//! Job state machine: download, segment, transcribe, assemble, clean up.

use crate::cancel::CancelFlag;
use crate::config::Config;
use crate::download::Downloader;
use crate::error::{ErrorKind, PodscribeError, Result};
use crate::media::{CommandRunner, DurationProber, Segment, Segmenter, extension_from_url};
use crate::progress::{Phase, PhaseTracker, ProgressSink};
use crate::transcribe::{
    FragmentOutcome, SegmentTranscriber, TranscriberSettings, TranscriptionBackend, assemble,
};
use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;

/// Lifecycle of a job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Downloading,
    Segmenting,
    Transcribing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Successful job output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub text: String,
    /// Segment files produced.
    pub segments: usize,
    /// Segments that returned text.
    pub transcribed: usize,
    /// Segments over the payload ceiling.
    pub skipped: usize,
    /// Segments whose retries ran out.
    pub failed: usize,
}

impl TranscriptSummary {
    fn from_fragments(fragments: &[FragmentOutcome]) -> Self {
        let count = |pred: fn(&FragmentOutcome) -> bool| fragments.iter().filter(|f| pred(f)).count();
        Self {
            text: assemble(fragments),
            segments: fragments.len(),
            transcribed: count(|f| matches!(f, FragmentOutcome::Text(_))),
            skipped: count(|f| matches!(f, FragmentOutcome::Skipped { .. })),
            failed: count(|f| matches!(f, FragmentOutcome::Failed { .. })),
        }
    }
}

/// One transcription request and everything it accumulates.
#[derive(Debug, Clone)]
pub struct Job {
    url: String,
    state: JobState,
    history: Vec<JobState>,
    segments: Vec<Segment>,
    fragments: Vec<FragmentOutcome>,
    error: Option<ErrorKind>,
}

impl Job {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            state: JobState::Idle,
            history: vec![JobState::Idle],
            segments: Vec::new(),
            fragments: Vec::new(),
            error: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state entered, in order.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn fragments(&self) -> &[FragmentOutcome] {
        &self.fragments
    }

    /// Kind of the error that failed the job.
    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    fn transition(&mut self, next: JobState) {
        if self.state.is_terminal() || next <= self.state {
            tracing::warn!(from = ?self.state, to = ?next, "ignoring invalid job transition");
            return;
        }
        tracing::debug!(from = ?self.state, to = ?next, "job state");
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, error: &PodscribeError) {
        self.error = Some(error.kind());
        self.transition(JobState::Failed);
    }
}

/// Largest segment size, up to `max_segment_bytes`, whose encoded payload
/// fits within `max_payload_bytes` for `backend`.
///
/// Segments above the payload ceiling are skipped rather than sent, so a
/// segment ceiling the backend cannot carry is lowered here.
pub fn fit_segment_ceiling(
    backend: &dyn TranscriptionBackend,
    max_segment_bytes: u64,
    max_payload_bytes: u64,
) -> Result<u64> {
    if backend.encoded_len(max_segment_bytes) <= max_payload_bytes {
        return Ok(max_segment_bytes);
    }

    // encoded_len is non-decreasing in the raw size.
    let (mut lo, mut hi) = (0u64, max_segment_bytes);
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if backend.encoded_len(mid) <= max_payload_bytes {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }

    if lo == 0 {
        return Err(PodscribeError::ConfigInvalidValue {
            key: "transcribe.max_payload_bytes".to_string(),
            message: format!(
                "{max_payload_bytes} bytes cannot carry any audio for the {} backend",
                backend.name()
            ),
        });
    }
    tracing::info!(
        backend = backend.name(),
        configured = max_segment_bytes,
        effective = lo,
        max_payload_bytes,
        "lowering segment ceiling to fit the backend payload limit"
    );
    Ok(lo)
}

/// Runs jobs end to end. Holds no per-job state, so one pipeline can serve
/// many jobs concurrently.
pub struct Pipeline {
    downloader: Downloader,
    prober: DurationProber,
    segmenter: Segmenter,
    transcriber: SegmentTranscriber,
    workspace_root: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        downloader: Downloader,
        prober: DurationProber,
        segmenter: Segmenter,
        transcriber: SegmentTranscriber,
    ) -> Self {
        Self {
            downloader,
            prober,
            segmenter,
            transcriber,
            workspace_root: None,
        }
    }

    /// Wire every stage from `config`.
    pub fn from_config(
        config: &Config,
        runner: Arc<dyn CommandRunner>,
        backend: Arc<dyn TranscriptionBackend>,
    ) -> Result<Self> {
        let downloader = Downloader::from_config(&config.download)?;
        let prober = DurationProber::new(runner.clone(), &config.segment.ffprobe);
        let max_segment_bytes = fit_segment_ceiling(
            backend.as_ref(),
            config.segment.max_segment_bytes,
            config.transcribe.max_payload_bytes,
        )?;
        let segmenter = Segmenter::new(runner, &config.segment.ffmpeg, max_segment_bytes)
            .with_max_split_depth(config.segment.max_split_depth);
        let transcriber =
            SegmentTranscriber::new(backend, TranscriberSettings::from_config(&config.transcribe));

        Ok(Self::new(downloader, prober, segmenter, transcriber)
            .with_workspace_root(config.workspace.root.clone()))
    }

    /// Parent directory for job workspaces; the system temp dir when `None`.
    pub fn with_workspace_root(mut self, root: Option<PathBuf>) -> Self {
        self.workspace_root = root;
        self
    }

    /// Transcribe the audio at `url`.
    pub async fn run(
        &self,
        url: &str,
        sink: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<TranscriptSummary> {
        let mut job = Job::new(url);
        self.execute(&mut job, sink, cancel).await
    }

    /// Drive `job` to a terminal state.
    ///
    /// The workspace is removed before returning on every path.
    pub async fn execute(
        &self,
        job: &mut Job,
        sink: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<TranscriptSummary> {
        let span = tracing::info_span!("job", url = %job.url);
        async move {
            job.transition(JobState::Downloading);
            let mut workspace = match Workspace::create(self.workspace_root.as_deref()) {
                Ok(workspace) => workspace,
                Err(e) => {
                    job.fail(&e);
                    return Err(e);
                }
            };

            let result = self.stages(job, &workspace, sink, cancel).await;

            if let Err(e) = workspace.cleanup() {
                tracing::warn!(error = %e, "workspace cleanup failed");
            }

            match &result {
                Ok(summary) => {
                    job.transition(JobState::Completed);
                    tracing::info!(
                        segments = summary.segments,
                        transcribed = summary.transcribed,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        chars = summary.text.len(),
                        "job completed"
                    );
                }
                Err(e) => {
                    job.fail(e);
                    tracing::error!(kind = ?e.kind(), error = %e, "job failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn stages(
        &self,
        job: &mut Job,
        workspace: &Workspace,
        sink: &mut dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> Result<TranscriptSummary> {
        let mut tracker = PhaseTracker::new(sink);
        cancel.check()?;

        tracker.enter(Phase::Download);
        let bytes = self
            .downloader
            .download(&job.url, |p| tracker.report(p))
            .await?;
        cancel.check()?;

        let source = workspace.file(&format!("source.{}", extension_from_url(&job.url)));
        tokio::fs::write(&source, &bytes)
            .await
            .map_err(|e| PodscribeError::Workspace {
                message: format!("Failed to write {}: {e}", source.display()),
            })?;
        let total_bytes = bytes.len() as u64;
        drop(bytes);

        let duration = self.prober.probe(&source).await?;
        cancel.check()?;

        job.transition(JobState::Segmenting);
        tracker.enter(Phase::Segment);
        job.segments = self
            .segmenter
            .segment(&source, duration, total_bytes, workspace.path(), |p| {
                tracker.report(p)
            })
            .await?;
        cancel.check()?;

        job.transition(JobState::Transcribing);
        tracker.enter(Phase::Transcribe);
        tracing::info!(
            segments = job.segments.len(),
            backend = self.transcriber.backend_name(),
            "transcribing"
        );
        job.fragments = self
            .transcriber
            .transcribe_all(&job.segments, cancel, |p| tracker.report(p))
            .await?;

        let summary = TranscriptSummary::from_fragments(&job.fragments);
        if summary.text.is_empty() {
            return Err(PodscribeError::EmptyTranscript {
                segments: summary.segments,
            });
        }
        Ok(summary)
    }
}
