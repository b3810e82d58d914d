//! Streaming HTTP download of the source audio into memory.

use crate::config::DownloadConfig;
use crate::error::{PodscribeError, Result};
use crate::progress::ratio_percent;
use futures_util::StreamExt;
use std::time::Duration;

/// Upper bound on the initial buffer reservation, whatever the server claims.
const MAX_PREALLOCATE: u64 = 64 * 1024 * 1024;

/// Fetches a remote audio resource. Performs no retries.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| PodscribeError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &DownloadConfig) -> Result<Self> {
        Self::new(Duration::from_secs(config.timeout_secs), &config.user_agent)
    }

    /// Download `url` completely.
    ///
    /// `on_progress` receives `round(received / total * 100)` whenever the
    /// rounded value changes. Without a Content-Length nothing is reported
    /// until the body is complete, then 100.
    pub async fn download(
        &self,
        url: &str,
        mut on_progress: impl FnMut(u8) + Send,
    ) -> Result<Vec<u8>> {
        let parsed = validate_url(url)?;

        tracing::info!(url = %parsed, "downloading");
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| PodscribeError::DownloadFailed {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PodscribeError::DownloadFailed {
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let total = response.content_length().filter(|&n| n > 0);
        let mut buffer = Vec::with_capacity(total.unwrap_or(0).min(MAX_PREALLOCATE) as usize);
        let mut last_percent = None;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PodscribeError::DownloadFailed {
                status: None,
                message: format!("Failed to read response body: {e}"),
            })?;
            buffer.extend_from_slice(&chunk);

            if let Some(total) = total {
                let percent = ratio_percent(buffer.len() as u64, total);
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    on_progress(percent);
                }
            }
        }

        if buffer.is_empty() {
            return Err(PodscribeError::DownloadFailed {
                status: Some(status.as_u16()),
                message: "response body is empty".to_string(),
            });
        }
        if let Some(total) = total
            && (buffer.len() as u64) < total
        {
            return Err(PodscribeError::DownloadFailed {
                status: None,
                message: format!("body truncated: received {} of {total} bytes", buffer.len()),
            });
        }
        if last_percent != Some(100) {
            on_progress(100);
        }

        tracing::info!(bytes = buffer.len(), "download complete");
        Ok(buffer)
    }
}

/// Accept only absolute http(s) URLs.
fn validate_url(url: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(url.trim()).map_err(|e| PodscribeError::DownloadFailed {
        status: None,
        message: format!("invalid URL {url:?}: {e}"),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(PodscribeError::DownloadFailed {
            status: None,
            message: format!("unsupported URL scheme {other:?}"),
        }),
    }
}
