//! System diagnostics and dependency checking.
//!
//! Verifies that the media tools are installed and that the selected
//! transcription backend has credentials.

use crate::config::{BackendKind, Config};
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working
    Ok,
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues
    Warning(String),
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CheckResult::Ok)
    }
}

/// Check if a command exists and runs with `version_arg`.
fn check_command(command: &str, version_arg: &str) -> CheckResult {
    match Command::new(command).arg(version_arg).output() {
        Ok(output) if output.status.success() => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!("'{command}' found but {version_arg} failed")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{command}': {e}")),
    }
}

/// Check that an API key is configured for the selected backend.
fn check_api_key(config: &Config) -> CheckResult {
    let has_key = config
        .transcribe
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    if has_key {
        return CheckResult::Ok;
    }
    let var = match config.transcribe.backend {
        BackendKind::Openai => "OPENAI_API_KEY",
        BackendKind::Gemini => "GOOGLE_AI_API_KEY",
    };
    CheckResult::Warning(format!("no API key; set PODSCRIBE_API_KEY or {var}"))
}

fn print_result(label: &str, result: &CheckResult) {
    match result {
        CheckResult::Ok => println!("  {label:<12} ✓"),
        CheckResult::NotFound => println!("  {label:<12} ✗ not found"),
        CheckResult::Warning(message) => println!("  {label:<12} ⚠ {message}"),
    }
}

/// Print a dependency report. Returns true when everything a job needs is
/// in place.
pub fn check_dependencies(config: &Config) -> bool {
    println!("podscribe {}", crate::version_string());
    println!();
    println!("Media tools:");
    let ffmpeg = check_command(&config.segment.ffmpeg, "-version");
    let ffprobe = check_command(&config.segment.ffprobe, "-version");
    print_result(&config.segment.ffmpeg, &ffmpeg);
    print_result(&config.segment.ffprobe, &ffprobe);

    println!();
    println!(
        "Transcription ({} / {}):",
        config.transcribe.backend,
        config.transcribe.effective_model()
    );
    let api_key = check_api_key(config);
    print_result("api key", &api_key);

    let ready = ffmpeg.is_ok() && ffprobe.is_ok() && api_key.is_ok();
    println!();
    if ready {
        println!("✓ Ready to transcribe.");
    } else {
        if !ffmpeg.is_ok() || !ffprobe.is_ok() {
            println!("⚠ Install ffmpeg (which provides ffprobe):");
            println!("  sudo apt install ffmpeg    (Debian/Ubuntu)");
            println!("  sudo pacman -S ffmpeg      (Arch)");
        }
        if !api_key.is_ok() {
            println!("⚠ Configure an API key for the {} backend.", config.transcribe.backend);
        }
    }
    ready
}
