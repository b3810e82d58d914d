//! Default configuration constants for podscribe.
//!
//! Shared by the config types and the pipeline stages so that a default
//! `Config` and a hand-built stage agree on every limit.

/// Largest segment file handed to the transcriber, in bytes.
///
/// 16 MiB leaves headroom below the backends' request limits once the
/// payload is wrapped in multipart or base64 encoding.
pub const MAX_SEGMENT_BYTES: u64 = 16 * 1024 * 1024;

/// Largest encoded payload sent to a transcription backend, in bytes.
///
/// Segments whose encoded size exceeds this are skipped with a warning.
pub const MAX_PAYLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// How many times an oversized segment may be split again.
pub const MAX_SPLIT_DEPTH: u32 = 3;

/// Transcription attempts per segment, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay for linear retry backoff, in milliseconds.
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Pause after each transcription request, in milliseconds.
pub const REQUEST_DELAY_MS: u64 = 1000;

/// Per-request timeout for the audio download, in seconds.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Per-request timeout for transcription calls, in seconds.
pub const TRANSCRIBE_TIMEOUT_SECS: u64 = 300;

/// Per-invocation timeout for ffmpeg/ffprobe, in seconds.
pub const TOOL_TIMEOUT_SECS: u64 = 300;

/// Capacity of the bounded progress queue.
pub const PROGRESS_BUFFER: usize = 64;

/// Container assumed when the URL carries no recognizable extension.
pub const DEFAULT_EXTENSION: &str = "mp3";

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";

/// Default model for the OpenAI-compatible Whisper backend.
pub const OPENAI_MODEL: &str = "whisper-1";

/// Default endpoint for the OpenAI-compatible Whisper backend.
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Default model for the Gemini backend.
pub const GEMINI_MODEL: &str = "gemini-1.5-pro";

/// Default base URL for the Gemini backend (model path is appended).
pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Instruction sent alongside the audio to instruction-following backends.
pub const GEMINI_PROMPT: &str = "Transcribe the following podcast audio file accurately.";

/// User agent sent with every HTTP request.
pub fn user_agent() -> String {
    format!("podscribe/{}", env!("CARGO_PKG_VERSION"))
}
