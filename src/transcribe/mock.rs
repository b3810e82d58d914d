//! Scriptable backend for tests and offline runs.

use super::{AudioPayload, TranscriptionBackend, gemini::base64_len};
use crate::error::{PodscribeError, Result};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct FailureRule {
    pattern: String,
    remaining: Option<u32>,
    status: u16,
}

#[derive(Debug, Clone)]
enum Reply {
    Fixed(String),
    /// First line of the payload, as text.
    Echo,
}

/// Mock transcription backend.
///
/// Replies with a fixed text (or echoes the payload's first line), can be
/// told to fail for files whose name contains a pattern, and records every
/// file name it was called with.
#[derive(Debug)]
pub struct MockBackend {
    model_name: String,
    reply: Reply,
    overrides: Vec<(String, String)>,
    failures: Mutex<Vec<FailureRule>>,
    base64_sizing: bool,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            model_name: "mock-model".to_string(),
            reply: Reply::Fixed("mock transcription".to_string()),
            overrides: Vec::new(),
            failures: Mutex::new(Vec::new()),
            base64_sizing: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` for every file.
    pub fn with_response(mut self, text: &str) -> Self {
        self.reply = Reply::Fixed(text.to_string());
        self
    }

    /// Reply with the first line of each payload.
    pub fn echo(mut self) -> Self {
        self.reply = Reply::Echo;
        self
    }

    /// Reply with `text` for files whose name contains `pattern`.
    pub fn with_response_for(mut self, pattern: &str, text: &str) -> Self {
        self.overrides.push((pattern.to_string(), text.to_string()));
        self
    }

    /// Fail with HTTP 503 for matching files, `times` times or forever.
    pub fn fail_on(self, pattern: &str, times: Option<u32>) -> Self {
        self.push_failure(pattern, times, 503)
    }

    /// Fail with HTTP 400 for matching files. Not retryable.
    pub fn reject(self, pattern: &str) -> Self {
        self.push_failure(pattern, None, 400)
    }

    /// Measure payloads as base64, like an inline-data backend.
    pub fn with_base64_sizing(mut self) -> Self {
        self.base64_sizing = true;
        self
    }

    fn push_failure(self, pattern: &str, times: Option<u32>, status: u16) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(FailureRule {
                pattern: pattern.to_string(),
                remaining: times,
                status,
            });
        self
    }

    /// File names received, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn scripted_failure(&self, file_name: &str) -> Option<u16> {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let rule = failures.iter_mut().find(|rule| {
            file_name.contains(&rule.pattern) && rule.remaining.is_none_or(|n| n > 0)
        })?;
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        Some(rule.status)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TranscriptionBackend for MockBackend {
    async fn transcribe(&self, payload: &AudioPayload) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(payload.file_name.clone());

        if let Some(status) = self.scripted_failure(&payload.file_name) {
            return Err(PodscribeError::Backend {
                backend: "mock".to_string(),
                status: Some(status),
                message: format!("scripted failure for {}", payload.file_name),
            });
        }

        if let Some((_, text)) = self
            .overrides
            .iter()
            .find(|(pattern, _)| payload.file_name.contains(pattern.as_str()))
        {
            return Ok(text.clone());
        }

        Ok(match &self.reply {
            Reply::Fixed(text) => text.clone(),
            Reply::Echo => String::from_utf8_lossy(&payload.bytes)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn encoded_len(&self, raw_len: u64) -> u64 {
        if self.base64_sizing {
            base64_len(raw_len)
        } else {
            raw_len
        }
    }
}
