//! Remote speech-to-text backends and the per-segment transcription policy.

pub mod batch;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod retry;

pub use batch::{FragmentOutcome, SegmentTranscriber, TranscriberSettings, assemble};
pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;
pub use retry::RetryPolicy;

use crate::config::{BackendKind, TranscribeConfig};
use crate::error::{PodscribeError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One segment file ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AudioPayload {
    /// Read `path`, typing it from its extension.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Ok(Self {
            file_name,
            mime_type: crate::media::mime_type(ext).to_string(),
            bytes,
        })
    }
}

/// Trait for remote transcription.
///
/// This trait allows swapping implementations (real backends vs mock).
#[async_trait::async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe one audio file to text.
    async fn transcribe(&self, payload: &AudioPayload) -> Result<String>;

    /// Backend identifier for logs and errors.
    fn name(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Size of the request body for `raw_len` bytes of audio, as measured
    /// against the payload ceiling.
    fn encoded_len(&self, raw_len: u64) -> u64 {
        raw_len
    }
}

/// Implement TranscriptionBackend for Arc<T> to allow sharing across jobs.
#[async_trait::async_trait]
impl<T: TranscriptionBackend + ?Sized> TranscriptionBackend for Arc<T> {
    async fn transcribe(&self, payload: &AudioPayload) -> Result<String> {
        (**self).transcribe(payload).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn encoded_len(&self, raw_len: u64) -> u64 {
        (**self).encoded_len(raw_len)
    }
}

/// Build the configured backend. Fails when no API key is available.
pub fn build_backend(config: &TranscribeConfig) -> Result<Arc<dyn TranscriptionBackend>> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| PodscribeError::ConfigInvalidValue {
            key: "transcribe.api_key".to_string(),
            message: match config.backend {
                BackendKind::Openai => "not set (use PODSCRIBE_API_KEY or OPENAI_API_KEY)",
                BackendKind::Gemini => "not set (use PODSCRIBE_API_KEY or GOOGLE_AI_API_KEY)",
            }
            .to_string(),
        })?;

    let client = http_client(Duration::from_secs(config.timeout_secs))?;
    let backend: Arc<dyn TranscriptionBackend> = match config.backend {
        BackendKind::Openai => Arc::new(
            OpenAiBackend::new(client, api_key, config.effective_model(), config.effective_endpoint())
                .with_organization(config.organization.clone())
                .with_language(config.language.clone()),
        ),
        BackendKind::Gemini => Arc::new(
            GeminiBackend::new(client, api_key, config.effective_model(), config.effective_endpoint())
                .with_prompt(&config.prompt),
        ),
    };
    tracing::debug!(backend = backend.name(), model = backend.model_name(), "transcription backend ready");
    Ok(backend)
}

/// HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(crate::defaults::user_agent())
        .build()
        .map_err(|e| PodscribeError::Other(format!("Failed to build HTTP client: {e}")))
}

/// Map a transport-level failure to a backend error.
pub(crate) fn request_error(backend: &str, error: reqwest::Error) -> PodscribeError {
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else {
        error.to_string()
    };
    PodscribeError::Backend {
        backend: backend.to_string(),
        status: error.status().map(|s| s.as_u16()),
        message,
    }
}

/// Pass successful responses through; turn the rest into backend errors
/// carrying the status and the start of the body.
pub(crate) async fn check_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let mut message: String = body.trim().chars().take(300).collect();
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or("error").to_string();
    }
    Err(PodscribeError::Backend {
        backend: backend.to_string(),
        status: Some(status.as_u16()),
        message,
    })
}
