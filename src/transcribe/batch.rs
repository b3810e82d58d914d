//! Sequential, rate-limited transcription of an ordered segment list.

use super::{AudioPayload, RetryPolicy, TranscriptionBackend};
use crate::cancel::CancelFlag;
use crate::config::TranscribeConfig;
use crate::error::{PodscribeError, Result};
use crate::media::Segment;
use crate::progress::percent;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Limits applied around each backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriberSettings {
    /// Encoded payloads above this are skipped, not sent.
    pub max_payload_bytes: u64,
    pub retry: RetryPolicy,
    /// Pause after each request before the next segment.
    pub request_delay: Duration,
}

impl TranscriberSettings {
    pub fn from_config(config: &TranscribeConfig) -> Self {
        Self {
            max_payload_bytes: config.max_payload_bytes,
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }
}

impl Default for TranscriberSettings {
    fn default() -> Self {
        Self::from_config(&TranscribeConfig::default())
    }
}

/// What one segment contributed to the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentOutcome {
    Text(String),
    /// Payload over the ceiling; never sent.
    Skipped { encoded_bytes: u64 },
    /// Retries exhausted or a permanent error.
    Failed { attempts: u32, message: String },
}

impl FragmentOutcome {
    /// Text contributed to the transcript; empty unless transcribed.
    pub fn text(&self) -> &str {
        match self {
            FragmentOutcome::Text(text) => text,
            _ => "",
        }
    }
}

/// Join fragment texts in order with single spaces, dropping empty ones.
pub fn assemble(fragments: &[FragmentOutcome]) -> String {
    fragments
        .iter()
        .map(|f| f.text().trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Applies the payload ceiling, retry and pacing policy around a backend.
pub struct SegmentTranscriber {
    backend: Arc<dyn TranscriptionBackend>,
    settings: TranscriberSettings,
}

impl SegmentTranscriber {
    pub fn new(backend: Arc<dyn TranscriptionBackend>, settings: TranscriberSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Transcribe one segment file.
    ///
    /// Returns `Skipped` for payloads over the ceiling and `TranscriptionFailed`
    /// once the retry budget is spent or the error is not transient.
    pub async fn transcribe(&self, index: usize, path: &Path) -> Result<FragmentOutcome> {
        let payload = AudioPayload::from_file(path)
            .await
            .map_err(|e| PodscribeError::TranscriptionFailed {
                segment: index,
                attempts: 0,
                message: format!("cannot read {}: {e}", path.display()),
            })?;

        let encoded_bytes = self.backend.encoded_len(payload.bytes.len() as u64);
        if encoded_bytes > self.settings.max_payload_bytes {
            tracing::warn!(
                segment = index,
                encoded_bytes,
                max_payload_bytes = self.settings.max_payload_bytes,
                "payload over backend ceiling, skipping segment"
            );
            return Ok(FragmentOutcome::Skipped { encoded_bytes });
        }

        let retry = self.settings.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.backend.transcribe(&payload).await {
                Ok(text) => {
                    tracing::debug!(segment = index, attempt, chars = text.len(), "segment transcribed");
                    return Ok(FragmentOutcome::Text(text));
                }
                Err(e) if retry.should_retry(attempt, &e) => {
                    let delay = retry.delay_after(attempt);
                    tracing::warn!(
                        segment = index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transcription failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(PodscribeError::TranscriptionFailed {
                        segment: index,
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Transcribe `segments` one at a time, in index order.
    ///
    /// A failed segment becomes a `Failed` outcome and the batch continues.
    /// Only cancellation aborts the batch. `on_progress` receives the
    /// percentage of segments finished.
    pub async fn transcribe_all(
        &self,
        segments: &[Segment],
        cancel: &CancelFlag,
        mut on_progress: impl FnMut(u8) + Send,
    ) -> Result<Vec<FragmentOutcome>> {
        let total = segments.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, segment) in segments.iter().enumerate() {
            cancel.check()?;

            let outcome = match self.transcribe(segment.index, &segment.path).await {
                Ok(outcome) => outcome,
                Err(PodscribeError::TranscriptionFailed {
                    segment,
                    attempts,
                    message,
                }) => {
                    tracing::warn!(segment, attempts, %message, "segment left empty");
                    FragmentOutcome::Failed { attempts, message }
                }
                Err(e) => return Err(e),
            };
            let sent = !matches!(outcome, FragmentOutcome::Skipped { .. });
            outcomes.push(outcome);
            on_progress(percent(i + 1, total));

            if sent && i + 1 < total && !self.settings.request_delay.is_zero() {
                tokio::time::sleep(self.settings.request_delay).await;
            }
        }

        Ok(outcomes)
    }
}
