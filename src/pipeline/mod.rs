//! Job orchestration and progress transport.
//!
//! A job runs its stages strictly in sequence on one task; the only
//! concurrency is the transport thread that turns queued progress events
//! into NDJSON lines.

pub mod orchestrator;
pub mod transport;

pub use orchestrator::{Job, JobState, Pipeline, TranscriptSummary, fit_segment_ceiling};
pub use transport::{NdjsonTransport, StreamRecord};
