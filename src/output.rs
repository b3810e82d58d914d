//! Terminal rendering for the `text` output format.
//!
//! One progress bar per phase on stderr, created when the phase starts.

use crate::pipeline::TranscriptSummary;
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const TEMPLATE: &str = "{prefix:>10.bold} [{bar:40.cyan/blue}] {pos:>3}%";

/// Progress sink drawing phase bars with `indicatif`.
pub struct ProgressBars {
    multi: MultiProgress,
    current: Option<(Phase, ProgressBar)>,
}

impl ProgressBars {
    /// Bars drawn on stderr, or nowhere when `visible` is false.
    pub fn new(visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
            current: None,
        }
    }

    fn start_bar(&self, phase: Phase) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(style);
        bar.set_prefix(phase.as_str());
        bar
    }

    /// Stop drawing. A bar left unfinished by a failed phase is abandoned.
    pub fn finish(&mut self) {
        if let Some((_, bar)) = self.current.take()
            && !bar.is_finished()
        {
            bar.abandon();
        }
    }
}

impl ProgressSink for ProgressBars {
    fn emit(&mut self, event: ProgressEvent) {
        let needs_bar = !matches!(&self.current, Some((phase, _)) if *phase == event.phase);
        if needs_bar {
            self.finish();
            let bar = self.start_bar(event.phase);
            self.current = Some((event.phase, bar));
        }
        if let Some((_, bar)) = &self.current {
            bar.set_position(u64::from(event.percent));
            if event.percent >= 100 {
                bar.finish();
            }
        }
    }

    fn name(&self) -> &'static str {
        "progress-bars"
    }
}

/// One-line account of how the segments fared.
pub fn summary_line(summary: &TranscriptSummary) -> String {
    format!(
        "{} segment(s): {} transcribed, {} skipped, {} failed",
        summary.segments, summary.transcribed, summary.skipped, summary.failed
    )
}
