//! Deterministic stand-in for ffprobe and ffmpeg.
//!
//! `SyntheticMedia` models a source of fixed duration whose byte rate may vary
//! over time. "Extracting" a slice writes a file whose size is the integral of
//! the byte rate over that slice, prefixed with a `slice <start> <end>` header
//! line, so tests can check both size ceilings and time coverage without real
//! audio tooling.

use crate::error::{PodscribeError, Result};
use crate::media::runner::CommandRunner;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Byte rate of the synthetic source over time.
#[derive(Debug, Clone)]
pub enum ByteRate {
    /// Same number of bytes per second throughout.
    Constant(f64),
    /// `(from_secs, bytes_per_sec)` steps, sorted by `from_secs`.
    Piecewise(Vec<(f64, f64)>),
}

impl ByteRate {
    /// Bytes produced between `from` and `to` seconds.
    pub fn bytes_between(&self, from: f64, to: f64) -> f64 {
        if to <= from {
            return 0.0;
        }
        match self {
            ByteRate::Constant(rate) => (to - from) * rate,
            ByteRate::Piecewise(steps) => steps
                .iter()
                .enumerate()
                .map(|(i, &(start, rate))| {
                    let end = steps.get(i + 1).map_or(f64::INFINITY, |next| next.0);
                    let overlap = to.min(end) - from.max(start);
                    if overlap > 0.0 { overlap * rate } else { 0.0 }
                })
                .sum(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: f64,
    duration: f64,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<PathBuf, Span>,
    extractions: usize,
}

/// Fake media toolchain implementing [`CommandRunner`].
#[derive(Debug)]
pub struct SyntheticMedia {
    duration: f64,
    rate: ByteRate,
    probe_output: Option<String>,
    fail_extraction: Option<usize>,
    state: Mutex<State>,
}

impl SyntheticMedia {
    /// Source of `duration` seconds at a constant byte rate.
    pub fn constant(duration: f64, bytes_per_sec: f64) -> Self {
        Self::with_rate(duration, ByteRate::Constant(bytes_per_sec))
    }

    /// Source of `duration` seconds with a stepwise byte rate.
    pub fn piecewise(duration: f64, steps: Vec<(f64, f64)>) -> Self {
        Self::with_rate(duration, ByteRate::Piecewise(steps))
    }

    fn with_rate(duration: f64, rate: ByteRate) -> Self {
        Self {
            duration,
            rate,
            probe_output: None,
            fail_extraction: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Make ffprobe print `output` verbatim.
    pub fn with_probe_output(mut self, output: &str) -> Self {
        self.probe_output = Some(output.to_string());
        self
    }

    /// Make the `n`th extraction (0-based) fail.
    pub fn fail_extraction(mut self, n: usize) -> Self {
        self.fail_extraction = Some(n);
        self
    }

    /// Size in bytes of the full synthetic source.
    pub fn source_bytes(&self) -> u64 {
        self.rate.bytes_between(0.0, self.duration).round() as u64
    }

    /// Number of extractions performed so far.
    pub fn extractions(&self) -> usize {
        self.lock().extractions
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn probe(&self, args: &[String]) -> Result<String> {
        if let Some(output) = &self.probe_output {
            return Ok(output.clone());
        }
        let path = args.last().map(PathBuf::from).unwrap_or_default();
        let duration = self
            .lock()
            .files
            .get(&path)
            .map_or(self.duration, |span| span.duration);
        Ok(format!("{duration:.6}\n"))
    }

    fn extract(&self, args: &[String]) -> Result<String> {
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
        };
        let bad_args = || PodscribeError::ToolFailed {
            tool: "ffmpeg".to_string(),
            message: format!("unsupported arguments: {args:?}"),
        };

        let offset: f64 = value_of("-ss")
            .and_then(|v| v.parse().ok())
            .ok_or_else(bad_args)?;
        let length: f64 = value_of("-t")
            .and_then(|v| v.parse().ok())
            .ok_or_else(bad_args)?;
        let input = value_of("-i").map(PathBuf::from).ok_or_else(bad_args)?;
        let output = args.last().map(PathBuf::from).ok_or_else(bad_args)?;

        let mut state = self.lock();
        let call = state.extractions;
        state.extractions += 1;
        if self.fail_extraction == Some(call) {
            return Err(PodscribeError::ToolFailed {
                tool: "ffmpeg".to_string(),
                message: format!("synthetic failure on extraction {call}"),
            });
        }

        let base = state.files.get(&input).copied().unwrap_or(Span {
            start: 0.0,
            duration: self.duration,
        });
        let start = base.start + offset;
        let duration = length.min(base.duration - offset).max(0.0);
        let size = self.rate.bytes_between(start, start + duration).round() as usize;

        let mut content = format!("slice {:.3} {:.3}\n", start, start + duration).into_bytes();
        if content.len() < size {
            content.resize(size, b'.');
        }
        std::fs::write(&output, &content)?;

        state.files.insert(output, Span { start, duration });
        Ok(String::new())
    }
}

#[async_trait::async_trait]
impl CommandRunner for SyntheticMedia {
    async fn run(&self, program: &str, args: &[String]) -> Result<String> {
        if program.ends_with("ffprobe") {
            self.probe(args)
        } else if program.ends_with("ffmpeg") {
            self.extract(args)
        } else {
            Err(PodscribeError::ToolNotFound {
                tool: program.to_string(),
            })
        }
    }
}
