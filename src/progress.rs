//! Per-phase progress events and the sinks that receive them.
//!
//! The orchestrator is the only writer. It talks to a [`ProgressSink`]
//! through a [`PhaseTracker`], which announces each phase with 0%, clamps
//! percentages to 100 and drops regressions, so every sink sees a
//! well-formed, non-decreasing sequence per phase.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// Pipeline phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Download,
    Segment,
    Transcribe,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Download, Phase::Segment, Phase::Transcribe];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Download => "download",
            Phase::Segment => "segment",
            Phase::Transcribe => "transcribe",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub percent: u8,
}

impl ProgressEvent {
    pub fn new(phase: Phase, percent: u8) -> Self {
        Self { phase, percent }
    }
}

/// `round(done / total * 100)`, clamped to 100. An empty total counts as done.
pub fn percent(done: usize, total: usize) -> u8 {
    ratio_percent(done as u64, total as u64)
}

/// Byte-count variant of [`percent`].
pub fn ratio_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let value = (done as f64 / total as f64 * 100.0).round();
    value.clamp(0.0, 100.0) as u8
}

/// Receiver of progress events. `emit` must never block the pipeline.
pub trait ProgressSink: Send {
    fn emit(&mut self, event: ProgressEvent);

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _event: ProgressEvent) {}

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Records every event in order.
#[derive(Debug, Default, Clone)]
pub struct CollectorSink {
    events: Vec<ProgressEvent>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    /// Percentages recorded for one phase.
    pub fn percents(&self, phase: Phase) -> Vec<u8> {
        self.events
            .iter()
            .filter(|e| e.phase == phase)
            .map(|e| e.percent)
            .collect()
    }
}

impl ProgressSink for CollectorSink {
    fn emit(&mut self, event: ProgressEvent) {
        self.events.push(event);
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Bounded queue feeding a separate reader.
///
/// When the queue is full the oldest pending event is discarded to make room,
/// so a slow or absent reader never stalls the job.
pub struct ChannelSink {
    tx: Sender<ProgressEvent>,
    evict: Receiver<ProgressEvent>,
    dropped: u64,
}

/// Create a [`ChannelSink`] and the receiver that drains it.
pub fn progress_channel(capacity: usize) -> (ChannelSink, Receiver<ProgressEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let sink = ChannelSink {
        tx,
        evict: rx.clone(),
        dropped: 0,
    };
    (sink, rx)
}

impl ChannelSink {
    /// Events discarded so far because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&mut self, event: ProgressEvent) {
        let mut pending = event;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    pending = returned;
                    if self.evict.try_recv().is_ok() {
                        self.dropped += 1;
                        tracing::debug!(dropped = self.dropped, "progress queue full, dropped oldest event");
                    }
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Enforces per-phase ordering on top of a sink.
pub struct PhaseTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    phase: Option<Phase>,
    last: u8,
}

impl<'a> PhaseTracker<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            phase: None,
            last: 0,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Start `phase` and emit its 0% event. Phases only move forward.
    pub fn enter(&mut self, phase: Phase) {
        if self.phase.is_some_and(|current| current >= phase) {
            tracing::warn!(%phase, current = ?self.phase, "ignoring backwards phase transition");
            return;
        }
        self.phase = Some(phase);
        self.last = 0;
        self.sink.emit(ProgressEvent::new(phase, 0));
    }

    /// Report progress in the current phase.
    ///
    /// Values above 100 are clamped; values not above the last report are
    /// dropped.
    pub fn report(&mut self, percent: u8) {
        let Some(phase) = self.phase else {
            return;
        };
        let percent = percent.min(100);
        if percent <= self.last {
            return;
        }
        self.last = percent;
        self.sink.emit(ProgressEvent::new(phase, percent));
    }
}
