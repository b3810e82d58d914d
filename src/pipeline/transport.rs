//! Newline-delimited JSON stream of progress and the terminal result.
//!
//! A writer thread drains the progress queue and writes one record per line.
//! [`NdjsonTransport::finish`] hands it the job outcome: the thread writes any
//! progress still queued, then exactly one `result` or `error` record, flushes
//! and exits.

use crate::error::{ErrorKind, Result};
use crate::pipeline::orchestrator::TranscriptSummary;
use crate::progress::{Phase, ProgressEvent};
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::thread::{self, JoinHandle};

/// One line of the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    Progress {
        phase: Phase,
        percent: u8,
    },
    Result {
        transcript: String,
        segments: usize,
        transcribed: usize,
        skipped: usize,
        failed: usize,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl StreamRecord {
    /// Terminal record for a finished job.
    pub fn from_outcome(outcome: &Result<TranscriptSummary>) -> Self {
        match outcome {
            Ok(summary) => StreamRecord::Result {
                transcript: summary.text.clone(),
                segments: summary.segments,
                transcribed: summary.transcribed,
                skipped: summary.skipped,
                failed: summary.failed,
            },
            Err(e) => StreamRecord::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamRecord::Progress { .. })
    }

    /// Serialize record to JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize record from JSON string.
    pub fn from_json(s: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl From<ProgressEvent> for StreamRecord {
    fn from(event: ProgressEvent) -> Self {
        StreamRecord::Progress {
            phase: event.phase,
            percent: event.percent,
        }
    }
}

/// Writes records, remembering the first I/O error and dropping output
/// after it so the reader side can disappear without stalling the job.
struct RecordWriter<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> RecordWriter<W> {
    fn write(&mut self, record: &StreamRecord) {
        if self.error.is_some() {
            return;
        }
        let line = match record.to_json() {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode stream record");
                return;
            }
        };
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            tracing::debug!(error = %e, "stream reader gone, discarding further records");
            self.error = Some(e);
        }
    }

    fn finish(self) -> io::Result<W> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.out),
        }
    }
}

/// Streams a job's progress to `W` on a dedicated thread.
pub struct NdjsonTransport<W: Write + Send + 'static> {
    terminal_tx: Sender<StreamRecord>,
    handle: JoinHandle<io::Result<W>>,
}

impl<W: Write + Send + 'static> NdjsonTransport<W> {
    /// Start draining `progress` into `out`.
    pub fn start(out: W, progress: Receiver<ProgressEvent>) -> Self {
        let (terminal_tx, terminal_rx) = crossbeam_channel::bounded::<StreamRecord>(1);
        let handle = thread::spawn(move || {
            let mut writer = RecordWriter { out, error: None };
            let terminal = loop {
                crossbeam_channel::select! {
                    recv(progress) -> msg => match msg {
                        Ok(event) => writer.write(&event.into()),
                        Err(_) => break terminal_rx.recv().ok(),
                    },
                    recv(terminal_rx) -> msg => break msg.ok(),
                }
            };
            for event in progress.try_iter() {
                writer.write(&event.into());
            }
            if let Some(record) = terminal {
                writer.write(&record);
            }
            writer.finish()
        });
        Self {
            terminal_tx,
            handle,
        }
    }

    /// Write the terminal record for `outcome`, close the stream and return
    /// the underlying writer.
    pub fn finish(self, outcome: &Result<TranscriptSummary>) -> io::Result<W> {
        // The thread only exits after receiving this or on a closed channel.
        if self.terminal_tx.send(StreamRecord::from_outcome(outcome)).is_err() {
            tracing::debug!("transport thread already stopped");
        }
        drop(self.terminal_tx);
        self.handle
            .join()
            .map_err(|_| io::Error::other("transport thread panicked"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PodscribeError;
    use crate::progress::{ProgressSink, progress_channel};

    fn lines(buf: &[u8]) -> Vec<StreamRecord> {
        String::from_utf8_lossy(buf)
            .lines()
            .map(|l| StreamRecord::from_json(l).unwrap())
            .collect()
    }

    #[test]
    fn test_progress_record_format() {
        let record = StreamRecord::from(ProgressEvent::new(Phase::Download, 40));
        assert_eq!(
            record.to_json().unwrap(),
            r#"{"type":"progress","phase":"download","percent":40}"#
        );
        assert!(!record.is_terminal());
    }

    #[test]
    fn test_error_record_format() {
        let outcome: Result<TranscriptSummary> = Err(PodscribeError::ProbeFailed {
            path: "/tmp/x.mp3".to_string(),
            message: "no duration".to_string(),
        });
        let record = StreamRecord::from_outcome(&outcome);
        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["kind"], "probe_failed");
        assert!(value["message"].as_str().unwrap().contains("no duration"));
        assert!(record.is_terminal());
    }

    #[test]
    fn test_stream_ends_with_single_terminal_record() {
        let (mut sink, rx) = progress_channel(16);
        let transport = NdjsonTransport::start(Vec::new(), rx);

        sink.emit(ProgressEvent::new(Phase::Download, 0));
        sink.emit(ProgressEvent::new(Phase::Download, 100));
        sink.emit(ProgressEvent::new(Phase::Segment, 0));

        let summary = TranscriptSummary {
            text: "hello world".to_string(),
            segments: 2,
            transcribed: 2,
            skipped: 0,
            failed: 0,
        };
        let out = transport.finish(&Ok(summary)).unwrap();
        let records = lines(&out);

        assert_eq!(records.len(), 4);
        assert_eq!(
            records[..3],
            [
                StreamRecord::Progress { phase: Phase::Download, percent: 0 },
                StreamRecord::Progress { phase: Phase::Download, percent: 100 },
                StreamRecord::Progress { phase: Phase::Segment, percent: 0 },
            ]
        );
        assert!(matches!(
            &records[3],
            StreamRecord::Result { transcript, segments: 2, .. } if transcript == "hello world"
        ));
        assert_eq!(records.iter().filter(|r| r.is_terminal()).count(), 1);
    }

    #[test]
    fn test_finish_without_progress() {
        let (_sink, rx) = progress_channel(4);
        let transport = NdjsonTransport::start(Vec::new(), rx);
        let out = transport.finish(&Err(PodscribeError::Cancelled)).unwrap();
        let records = lines(&out);
        assert_eq!(
            records,
            vec![StreamRecord::Error {
                kind: ErrorKind::Cancelled,
                message: "Job cancelled".to_string()
            }]
        );
    }

    #[test]
    fn test_broken_writer_reports_error() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let (mut sink, rx) = progress_channel(4);
        let transport = NdjsonTransport::start(Broken, rx);
        sink.emit(ProgressEvent::new(Phase::Download, 0));
        let result = transport.finish(&Err(PodscribeError::Cancelled));
        assert_eq!(result.err().unwrap().kind(), io::ErrorKind::BrokenPipe);
    }
}
