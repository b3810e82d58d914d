//! Gemini `generateContent` backend with inline base64 audio.

use super::{AudioPayload, TranscriptionBackend, check_status, request_error};
use crate::error::{PodscribeError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

const NAME: &str = "gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Instruction prompt plus the segment as base64 `inlineData`.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    prompt: String,
}

impl GeminiBackend {
    /// `endpoint` is the API base; `/models/{model}:generateContent` is appended.
    pub fn new(client: reqwest::Client, api_key: &str, model: &str, endpoint: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            prompt: crate::defaults::GEMINI_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// Length of the base64 encoding of `raw_len` bytes, with padding.
pub fn base64_len(raw_len: u64) -> u64 {
    raw_len.div_ceil(3) * 4
}

#[async_trait::async_trait]
impl TranscriptionBackend for GeminiBackend {
    async fn transcribe(&self, payload: &AudioPayload) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::Text { text: &self.prompt },
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: &payload.mime_type,
                            data: STANDARD.encode(&payload.bytes),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(NAME, e))?;
        let response = check_status(NAME, response).await?;
        let body: GenerateResponse = response.json().await.map_err(|e| PodscribeError::Backend {
            backend: NAME.to_string(),
            status: None,
            message: format!("malformed response: {e}"),
        })?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(text)
    }

    fn name(&self) -> &str {
        NAME
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn encoded_len(&self, raw_len: u64) -> u64 {
        base64_len(raw_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> GeminiBackend {
        let client = super::super::http_client(Duration::from_secs(5)).unwrap();
        GeminiBackend::new(client, "g-key", "gemini-1.5-pro", &format!("{}/v1beta/", server.uri()))
    }

    #[test]
    fn test_base64_len_matches_encoder() {
        for n in [0usize, 1, 2, 3, 4, 5, 100, 1001] {
            let encoded = STANDARD.encode(vec![0u8; n]);
            assert_eq!(base64_len(n as u64), encoded.len() as u64, "n = {n}");
        }
    }

    #[tokio::test]
    async fn test_transcribe_sends_inline_audio_and_joins_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-pro:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{
                    "parts": [
                        { "text": "Say it" },
                        { "inlineData": { "mimeType": "audio/mpeg", "data": "AQID" } }
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = AudioPayload {
            file_name: "segment_000.mp3".to_string(),
            mime_type: "audio/mpeg".to_string(),
            bytes: vec![1, 2, 3],
        };
        let text = backend(&server)
            .with_prompt("Say it")
            .transcribe(&payload)
            .await
            .unwrap();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn test_no_candidates_is_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let payload = AudioPayload {
            file_name: "a.mp3".to_string(),
            mime_type: "audio/mpeg".to_string(),
            bytes: vec![0],
        };
        assert_eq!(backend(&server).transcribe(&payload).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let payload = AudioPayload {
            file_name: "a.mp3".to_string(),
            mime_type: "audio/mpeg".to_string(),
            bytes: vec![0],
        };
        let err = backend(&server).transcribe(&payload).await.unwrap_err();
        assert!(matches!(err, PodscribeError::Backend { status: Some(503), .. }));
        assert!(err.is_retryable());
    }
}
