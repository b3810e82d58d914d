//! OpenAI-compatible Whisper backend (`/v1/audio/transcriptions`).

use super::{AudioPayload, TranscriptionBackend, check_status, request_error};
use crate::error::{PodscribeError, Result};
use reqwest::multipart;
use serde::Deserialize;

const NAME: &str = "openai";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Multipart upload of the raw segment bytes with bearer auth.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    organization: Option<String>,
    language: Option<String>,
}

impl OpenAiBackend {
    pub fn new(client: reqwest::Client, api_key: &str, model: &str, endpoint: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
            organization: None,
            language: None,
        }
    }

    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization.filter(|o| !o.is_empty());
        self
    }

    /// ISO-639-1 hint passed to the model.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.is_empty());
        self
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for OpenAiBackend {
    async fn transcribe(&self, payload: &AudioPayload) -> Result<String> {
        let file_part = multipart::Part::bytes(payload.bytes.clone())
            .file_name(payload.file_name.clone())
            .mime_str(&payload.mime_type)
            .map_err(|e| PodscribeError::Backend {
                backend: NAME.to_string(),
                status: None,
                message: format!("invalid MIME type {:?}: {e}", payload.mime_type),
            })?;

        let mut form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file_part);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form);
        if let Some(org) = &self.organization {
            request = request.header("OpenAI-Organization", org);
        }

        let response = request.send().await.map_err(|e| request_error(NAME, e))?;
        let response = check_status(NAME, response).await?;
        let body: TranscriptionResponse =
            response.json().await.map_err(|e| PodscribeError::Backend {
                backend: NAME.to_string(),
                status: None,
                message: format!("malformed response: {e}"),
            })?;
        Ok(body.text)
    }

    fn name(&self) -> &str {
        NAME
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
