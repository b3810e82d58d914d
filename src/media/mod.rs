//! Local media handling: external tool invocation, probing and segmentation.

pub mod probe;
pub mod runner;
pub mod segmenter;
pub mod synthetic;

pub use probe::DurationProber;
pub use runner::{CommandRunner, SystemCommandRunner};
pub use segmenter::{Segment, Segmenter, Slice, plan_slices};
pub use synthetic::SyntheticMedia;

use crate::defaults;

/// Container extensions recognized in source URLs.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "mp4", "aac", "wav", "ogg", "opus", "flac", "webm",
];

/// Container extension for an audio URL, from the last path component.
///
/// Query strings and fragments are ignored. Unknown or missing extensions
/// fall back to `mp3`.
pub fn extension_from_url(url: &str) -> &'static str {
    let ext = reqwest::Url::parse(url).ok().and_then(|parsed| {
        let name = parsed.path_segments()?.next_back()?.to_string();
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    });

    ext.and_then(|ext| {
        SUPPORTED_EXTENSIONS
            .iter()
            .copied()
            .find(|known| *known == ext)
    })
    .unwrap_or(defaults::DEFAULT_EXTENSION)
}

/// MIME type used when uploading a file with the given extension.
pub fn mime_type(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "application/octet-stream",
    }
}
