use crate::defaults;
use crate::error::{PodscribeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub download: DownloadConfig,
    pub segment: SegmentConfig,
    pub transcribe: TranscribeConfig,
    pub workspace: WorkspaceConfig,
    pub progress: ProgressConfig,
    pub logging: LoggingConfig,
}

/// Audio download configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentConfig {
    pub max_segment_bytes: u64,
    pub max_split_depth: u32,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub tool_timeout_secs: u64,
}

/// Remote transcription configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscribeConfig {
    pub backend: BackendKind,
    /// Model name; `None` picks the backend's default.
    pub model: Option<String>,
    /// Endpoint override; `None` picks the backend's default.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// OpenAI organization header.
    pub organization: Option<String>,
    pub language: Option<String>,
    pub prompt: String,
    pub max_payload_bytes: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

/// Transcription backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Openai,
    Gemini,
}

impl std::str::FromStr for BackendKind {
    type Err = PodscribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "whisper" => Ok(BackendKind::Openai),
            "gemini" | "google" => Ok(BackendKind::Gemini),
            other => Err(PodscribeError::ConfigInvalidValue {
                key: "transcribe.backend".to_string(),
                message: format!("unknown backend '{other}' (expected openai or gemini)"),
            }),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Openai => write!(f, "openai"),
            BackendKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// Temporary workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory for job workspaces; system temp dir when unset.
    pub root: Option<PathBuf>,
}

/// Progress stream configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressConfig {
    pub buffer: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::DOWNLOAD_TIMEOUT_SECS,
            user_agent: defaults::user_agent(),
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_segment_bytes: defaults::MAX_SEGMENT_BYTES,
            max_split_depth: defaults::MAX_SPLIT_DEPTH,
            ffmpeg: defaults::FFMPEG.to_string(),
            ffprobe: defaults::FFPROBE.to_string(),
            tool_timeout_secs: defaults::TOOL_TIMEOUT_SECS,
        }
    }
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: None,
            endpoint: None,
            api_key: None,
            organization: None,
            language: None,
            prompt: defaults::GEMINI_PROMPT.to_string(),
            max_payload_bytes: defaults::MAX_PAYLOAD_BYTES,
            max_attempts: defaults::MAX_ATTEMPTS,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            request_delay_ms: defaults::REQUEST_DELAY_MS,
            timeout_secs: defaults::TRANSCRIBE_TIMEOUT_SECS,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            buffer: defaults::PROGRESS_BUFFER,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl TranscribeConfig {
    /// Model name with the backend default applied.
    pub fn effective_model(&self) -> &str {
        match (&self.model, self.backend) {
            (Some(model), _) if !model.is_empty() => model.as_str(),
            (_, BackendKind::Openai) => defaults::OPENAI_MODEL,
            (_, BackendKind::Gemini) => defaults::GEMINI_MODEL,
        }
    }

    /// Endpoint with the backend default applied.
    pub fn effective_endpoint(&self) -> &str {
        match (&self.endpoint, self.backend) {
            (Some(endpoint), _) if !endpoint.is_empty() => endpoint.as_str(),
            (_, BackendKind::Openai) => defaults::OPENAI_ENDPOINT,
            (_, BackendKind::Gemini) => defaults::GEMINI_ENDPOINT,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PodscribeError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                PodscribeError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Only a missing file falls back to defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(PodscribeError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - PODSCRIBE_BACKEND → transcribe.backend
    /// - PODSCRIBE_MODEL → transcribe.model
    /// - PODSCRIBE_API_KEY → transcribe.api_key
    /// - OPENAI_API_KEY / GOOGLE_AI_API_KEY → transcribe.api_key, when unset
    ///   and the matching backend is selected
    /// - OPENAI_ORG_ID → transcribe.organization
    pub fn with_env_overrides(self) -> Self {
        self.with_env_overrides_for(None)
    }

    /// Like [`Config::with_env_overrides`], with `backend` (from the command
    /// line) taking precedence over PODSCRIBE_BACKEND. The backend-specific
    /// key variable is chosen after the backend is settled.
    pub fn with_env_overrides_for(mut self, backend: Option<BackendKind>) -> Self {
        if let Ok(backend) = std::env::var("PODSCRIBE_BACKEND")
            && let Ok(kind) = backend.parse::<BackendKind>()
        {
            self.transcribe.backend = kind;
        }
        if let Some(backend) = backend {
            self.transcribe.backend = backend;
        }

        if let Ok(model) = std::env::var("PODSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.transcribe.model = Some(model);
        }

        if let Ok(key) = std::env::var("PODSCRIBE_API_KEY")
            && !key.is_empty()
        {
            self.transcribe.api_key = Some(key);
        }

        if self.transcribe.api_key.is_none() {
            let var = match self.transcribe.backend {
                BackendKind::Openai => "OPENAI_API_KEY",
                BackendKind::Gemini => "GOOGLE_AI_API_KEY",
            };
            if let Ok(key) = std::env::var(var)
                && !key.is_empty()
            {
                self.transcribe.api_key = Some(key);
            }
        }

        if let Ok(org) = std::env::var("OPENAI_ORG_ID")
            && !org.is_empty()
        {
            self.transcribe.organization = Some(org);
        }

        self
    }

    /// Check limits that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> PodscribeError {
            PodscribeError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        if self.segment.max_segment_bytes == 0 {
            return Err(invalid("segment.max_segment_bytes", "must be positive"));
        }
        if self.transcribe.max_payload_bytes == 0 {
            return Err(invalid("transcribe.max_payload_bytes", "must be positive"));
        }
        if self.transcribe.max_attempts == 0 {
            return Err(invalid("transcribe.max_attempts", "must be at least 1"));
        }
        if self.progress.buffer == 0 {
            return Err(invalid("progress.buffer", "must be at least 1"));
        }
        if self.download.timeout_secs == 0 || self.transcribe.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "timeouts must be positive"));
        }
        Ok(())
    }

    /// Serialize the configuration as TOML, masking the API key.
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.transcribe.api_key.is_some() {
            shown.transcribe.api_key = Some("********".to_string());
        }
        toml::to_string_pretty(&shown).map_err(|e| PodscribeError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Commented configuration file with every default spelled out.
    pub fn template() -> String {
        format!(
            r#"# podscribe configuration

[download]
# Per-request timeout for fetching the source audio, in seconds.
timeout_secs = {download_timeout}
user_agent = "{user_agent}"

[segment]
# Largest segment file handed to the transcriber, in bytes.
max_segment_bytes = {max_segment_bytes}
# How many times an oversized segment may be split again.
max_split_depth = {max_split_depth}
ffmpeg = "{ffmpeg}"
ffprobe = "{ffprobe}"
tool_timeout_secs = {tool_timeout}

[transcribe]
# "openai" or "gemini". The API key normally comes from PODSCRIBE_API_KEY,
# OPENAI_API_KEY or GOOGLE_AI_API_KEY.
backend = "openai"
# model = "{openai_model}"
# endpoint = "{openai_endpoint}"
# language = "en"
prompt = "{prompt}"
# Segments whose encoded payload exceeds this are skipped.
max_payload_bytes = {max_payload_bytes}
max_attempts = {max_attempts}
retry_base_delay_ms = {retry_base_delay_ms}
# Pause between consecutive segment requests.
request_delay_ms = {request_delay_ms}
timeout_secs = {transcribe_timeout}

[workspace]
# Parent directory for per-job temporary directories (default: system temp).
# root = "/var/tmp/podscribe"

[progress]
buffer = {buffer}

[logging]
level = "info"
json = false
"#,
            download_timeout = defaults::DOWNLOAD_TIMEOUT_SECS,
            user_agent = defaults::user_agent(),
            max_segment_bytes = defaults::MAX_SEGMENT_BYTES,
            max_split_depth = defaults::MAX_SPLIT_DEPTH,
            ffmpeg = defaults::FFMPEG,
            ffprobe = defaults::FFPROBE,
            tool_timeout = defaults::TOOL_TIMEOUT_SECS,
            openai_model = defaults::OPENAI_MODEL,
            openai_endpoint = defaults::OPENAI_ENDPOINT,
            prompt = defaults::GEMINI_PROMPT,
            max_payload_bytes = defaults::MAX_PAYLOAD_BYTES,
            max_attempts = defaults::MAX_ATTEMPTS,
            retry_base_delay_ms = defaults::RETRY_BASE_DELAY_MS,
            request_delay_ms = defaults::REQUEST_DELAY_MS,
            transcribe_timeout = defaults::TRANSCRIBE_TIMEOUT_SECS,
            buffer = defaults::PROGRESS_BUFFER,
        )
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/podscribe/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("podscribe")
            .join("config.toml")
    }
}
