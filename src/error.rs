//! Error types for podscribe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Pipeline stage errors
    #[error("Download failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    DownloadFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("Duration probe failed for {path}: {message}")]
    ProbeFailed { path: String, message: String },

    #[error("Segment extraction failed: {message}")]
    SegmentFailed { message: String },

    #[error("Transcription of segment {segment} failed after {attempts} attempt(s): {message}")]
    TranscriptionFailed {
        segment: usize,
        attempts: u32,
        message: String,
    },

    #[error("Transcript is empty: none of {segments} segment(s) produced text")]
    EmptyTranscript { segments: usize },

    #[error("Job cancelled")]
    Cancelled,

    // External tools
    #[error("Required tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    // Remote transcription backends
    #[error("{backend} request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Backend {
        backend: String,
        status: Option<u16>,
        message: String,
    },

    // Temporary workspace
    #[error("Workspace error: {message}")]
    Workspace { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

/// Machine-readable error category, carried by the terminal stream record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DownloadFailed,
    ProbeFailed,
    SegmentFailed,
    TranscriptionFailed,
    EmptyTranscript,
    Cancelled,
    Workspace,
    Config,
    Internal,
}

impl PodscribeError {
    /// Category of this error for structured output.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PodscribeError::ConfigFileNotFound { .. }
            | PodscribeError::ConfigParse { .. }
            | PodscribeError::ConfigInvalidValue { .. }
            | PodscribeError::Config(_) => ErrorKind::Config,
            PodscribeError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            PodscribeError::ProbeFailed { .. } => ErrorKind::ProbeFailed,
            PodscribeError::SegmentFailed { .. } => ErrorKind::SegmentFailed,
            PodscribeError::TranscriptionFailed { .. } | PodscribeError::Backend { .. } => {
                ErrorKind::TranscriptionFailed
            }
            PodscribeError::EmptyTranscript { .. } => ErrorKind::EmptyTranscript,
            PodscribeError::Cancelled => ErrorKind::Cancelled,
            PodscribeError::Workspace { .. } => ErrorKind::Workspace,
            PodscribeError::ToolNotFound { .. }
            | PodscribeError::ToolFailed { .. }
            | PodscribeError::Io(_)
            | PodscribeError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether a retry of the failed backend call may succeed.
    ///
    /// Network failures and timeouts carry no status. 408, 429 and 5xx are
    /// transient; any other HTTP status is treated as permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            PodscribeError::Backend { status: None, .. } => true,
            PodscribeError::Backend {
                status: Some(code), ..
            } => *code == 408 || *code == 429 || (500..600).contains(code),
            PodscribeError::Io(_) => true,
            _ => false,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PodscribeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_file_not_found_display() {
        let error = PodscribeError::ConfigFileNotFound {
            path: "/path/to/config.toml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found at /path/to/config.toml"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = PodscribeError::ConfigInvalidValue {
            key: "segment.max_segment_bytes".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for segment.max_segment_bytes: must be positive"
        );
    }

    #[test]
    fn test_download_failed_display_with_status() {
        let error = PodscribeError::DownloadFailed {
            status: Some(404),
            message: "Not Found".to_string(),
        };
        assert_eq!(error.to_string(), "Download failed (HTTP 404): Not Found");
    }

    #[test]
    fn test_download_failed_display_without_status() {
        let error = PodscribeError::DownloadFailed {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(error.to_string(), "Download failed: connection refused");
    }

    #[test]
    fn test_transcription_failed_display() {
        let error = PodscribeError::TranscriptionFailed {
            segment: 2,
            attempts: 3,
            message: "timeout".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription of segment 2 failed after 3 attempt(s): timeout"
        );
    }

    #[test]
    fn test_empty_transcript_display() {
        let error = PodscribeError::EmptyTranscript { segments: 4 };
        assert_eq!(
            error.to_string(),
            "Transcript is empty: none of 4 segment(s) produced text"
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            PodscribeError::ProbeFailed {
                path: "a.mp3".into(),
                message: "no duration".into()
            }
            .kind(),
            ErrorKind::ProbeFailed
        );
        assert_eq!(PodscribeError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            PodscribeError::SegmentFailed {
                message: "x".into()
            }
            .kind(),
            ErrorKind::SegmentFailed
        );
        assert_eq!(
            PodscribeError::Other("x".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::EmptyTranscript).unwrap();
        assert_eq!(json, "\"empty_transcript\"");
    }

    #[test]
    fn test_backend_retryable_statuses() {
        let with_status = |status| PodscribeError::Backend {
            backend: "openai".into(),
            status,
            message: String::new(),
        };
        assert!(with_status(None).is_retryable());
        assert!(with_status(Some(429)).is_retryable());
        assert!(with_status(Some(408)).is_retryable());
        assert!(with_status(Some(503)).is_retryable());
        assert!(!with_status(Some(400)).is_retryable());
        assert!(!with_status(Some(401)).is_retryable());
        assert!(!PodscribeError::Cancelled.is_retryable());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: PodscribeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
        assert_eq!(error.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: PodscribeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
        assert_eq!(error.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PodscribeError>();
        assert_sync::<PodscribeError>();
    }
}
