//! End-to-end jobs against a local HTTP server, synthetic media tooling and
//! a scripted transcription backend.

use podscribe::config::Config;
use podscribe::download::Downloader;
use podscribe::media::{CommandRunner, DurationProber, Segmenter, SyntheticMedia};
use podscribe::pipeline::{Job, JobState, NdjsonTransport, Pipeline, StreamRecord};
use podscribe::progress::{Phase, ProgressEvent, ProgressSink, progress_channel};
use podscribe::transcribe::{
    MockBackend, RetryPolicy, SegmentTranscriber, TranscriberSettings, TranscriptionBackend,
};
use podscribe::{CancelFlag, CollectorSink, ErrorKind, PodscribeError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EPISODE: &str = "/feed/episode.mp3";

async fn serve_source(media: &SyntheticMedia) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EPISODE))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; media.source_bytes() as usize]))
        .mount(&server)
        .await;
    server
}

fn episode_url(server: &MockServer) -> String {
    format!("{}{EPISODE}", server.uri())
}

fn fast_settings() -> TranscriberSettings {
    TranscriberSettings {
        max_payload_bytes: u64::MAX,
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        request_delay: Duration::ZERO,
    }
}

fn build_pipeline(
    media: Arc<SyntheticMedia>,
    backend: Arc<MockBackend>,
    max_segment_bytes: u64,
    root: &Path,
) -> Pipeline {
    let downloader = Downloader::new(Duration::from_secs(5), "podscribe-test").unwrap();
    let prober = DurationProber::new(media.clone(), "ffprobe");
    let segmenter = Segmenter::new(media, "ffmpeg", max_segment_bytes);
    let transcriber = SegmentTranscriber::new(backend, fast_settings());
    Pipeline::new(downloader, prober, segmenter, transcriber)
        .with_workspace_root(Some(root.to_path_buf()))
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_failed_segment_is_left_out_of_transcript() {
    let media = Arc::new(SyntheticMedia::constant(90.0, 1000.0));
    let backend = Arc::new(MockBackend::new().echo().fail_on("segment_001", Some(3)));
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media.clone(), backend.clone(), 30_000, root.path());

    let mut job = Job::new(&episode_url(&server));
    let mut sink = CollectorSink::new();
    let summary = pipeline
        .execute(&mut job, &mut sink, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.text, "slice 0.000 30.000 slice 60.000 90.000");
    assert_eq!(summary.segments, 3);
    assert_eq!(summary.transcribed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(media.extractions(), 3);

    let calls = backend.calls();
    assert_eq!(calls.iter().filter(|c| c.contains("segment_001")).count(), 3);
    assert_eq!(calls.first().map(String::as_str), Some("segment_000.mp3"));
    assert_eq!(calls.last().map(String::as_str), Some("segment_002.mp3"));

    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(
        job.history(),
        &[
            JobState::Idle,
            JobState::Downloading,
            JobState::Segmenting,
            JobState::Transcribing,
            JobState::Completed
        ]
    );
    assert!(job.error().is_none());
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_segments_cover_source_in_order() {
    let media = Arc::new(SyntheticMedia::constant(100.0, 1000.0));
    let backend = Arc::new(MockBackend::new().echo());
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media, backend, 40_000, root.path());

    let mut job = Job::new(&episode_url(&server));
    pipeline
        .execute(&mut job, &mut CollectorSink::new(), &CancelFlag::new())
        .await
        .unwrap();

    let segments = job.segments();
    assert_eq!(segments.len(), 3);
    let mut expected_start = 0.0;
    for (i, segment) in segments.iter().enumerate() {
        assert_eq!(segment.index, i);
        assert!((segment.start_secs - expected_start).abs() < 1e-6);
        assert!(segment.bytes <= 40_000);
        expected_start += segment.duration_secs;
    }
    assert!((expected_start - 100.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_all_segments_failing_is_empty_transcript() {
    let media = Arc::new(SyntheticMedia::constant(60.0, 1000.0));
    let backend = Arc::new(MockBackend::new().reject("segment_"));
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media, backend.clone(), 30_000, root.path());

    let mut job = Job::new(&episode_url(&server));
    let err = pipeline
        .execute(&mut job, &mut CollectorSink::new(), &CancelFlag::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PodscribeError::EmptyTranscript { segments: 2 }));
    // 400 is permanent: one attempt per segment.
    assert_eq!(backend.calls().len(), 2);
    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(job.error(), Some(ErrorKind::EmptyTranscript));
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_download_not_found_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let media = Arc::new(SyntheticMedia::constant(60.0, 1000.0));
    let backend = Arc::new(MockBackend::new());
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media.clone(), backend.clone(), 30_000, root.path());

    let mut job = Job::new(&episode_url(&server));
    let err = pipeline
        .execute(&mut job, &mut CollectorSink::new(), &CancelFlag::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PodscribeError::DownloadFailed { status: Some(404), .. }));
    assert_eq!(
        job.history(),
        &[JobState::Idle, JobState::Downloading, JobState::Failed]
    );
    assert_eq!(media.extractions(), 0);
    assert!(backend.calls().is_empty());
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_unreadable_duration_fails_before_segmenting() {
    let media = Arc::new(SyntheticMedia::constant(60.0, 1000.0).with_probe_output("N/A\n"));
    let backend = Arc::new(MockBackend::new());
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media.clone(), backend, 30_000, root.path());

    let mut job = Job::new(&episode_url(&server));
    let err = pipeline
        .execute(&mut job, &mut CollectorSink::new(), &CancelFlag::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProbeFailed);
    assert_eq!(media.extractions(), 0);
    assert!(!job.history().contains(&JobState::Segmenting));
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_extraction_failure_fails_job_and_cleans_up() {
    let media = Arc::new(SyntheticMedia::constant(90.0, 1000.0).fail_extraction(1));
    let backend = Arc::new(MockBackend::new());
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media, backend.clone(), 30_000, root.path());

    let mut job = Job::new(&episode_url(&server));
    let err = pipeline
        .execute(&mut job, &mut CollectorSink::new(), &CancelFlag::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SegmentFailed);
    assert_eq!(job.state(), JobState::Failed);
    assert!(backend.calls().is_empty());
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let media = Arc::new(SyntheticMedia::constant(60.0, 1000.0));
    let backend = Arc::new(MockBackend::new());
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media, backend, 30_000, root.path());

    let cancel = CancelFlag::new();
    cancel.cancel();
    let mut job = Job::new(&episode_url(&server));
    let err = pipeline
        .execute(&mut job, &mut CollectorSink::new(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PodscribeError::Cancelled));
    assert_eq!(job.error(), Some(ErrorKind::Cancelled));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert!(is_empty_dir(root.path()));
}

/// Trips the cancel flag as soon as the transcription phase starts.
struct CancelOnTranscribe {
    cancel: CancelFlag,
    events: Vec<ProgressEvent>,
}

impl ProgressSink for CancelOnTranscribe {
    fn emit(&mut self, event: ProgressEvent) {
        if event.phase == Phase::Transcribe {
            self.cancel.cancel();
        }
        self.events.push(event);
    }

    fn name(&self) -> &'static str {
        "cancel-on-transcribe"
    }
}

#[tokio::test]
async fn test_cancel_between_segments_stops_transcription() {
    let media = Arc::new(SyntheticMedia::constant(90.0, 1000.0));
    let backend = Arc::new(MockBackend::new());
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media, backend.clone(), 30_000, root.path());

    let cancel = CancelFlag::new();
    let mut sink = CancelOnTranscribe {
        cancel: cancel.clone(),
        events: Vec::new(),
    };
    let mut job = Job::new(&episode_url(&server));
    let err = pipeline.execute(&mut job, &mut sink, &cancel).await.unwrap_err();

    assert!(matches!(err, PodscribeError::Cancelled));
    assert!(backend.calls().is_empty());
    assert_eq!(job.segments().len(), 3);
    assert_eq!(
        job.history(),
        &[
            JobState::Idle,
            JobState::Downloading,
            JobState::Segmenting,
            JobState::Transcribing,
            JobState::Failed
        ]
    );
    assert!(is_empty_dir(root.path()));
}

#[tokio::test]
async fn test_progress_phases_ordered_and_monotonic() {
    let media = Arc::new(SyntheticMedia::constant(120.0, 1000.0));
    let backend = Arc::new(MockBackend::new());
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media, backend, 30_000, root.path());

    let mut sink = CollectorSink::new();
    pipeline
        .run(&episode_url(&server), &mut sink, &CancelFlag::new())
        .await
        .unwrap();

    let phases: Vec<Phase> = sink.events().iter().map(|e| e.phase).collect();
    assert!(phases.windows(2).all(|w| w[0] <= w[1]), "phases out of order: {phases:?}");

    for phase in Phase::ALL {
        let percents = sink.percents(phase);
        assert_eq!(percents.first(), Some(&0), "{phase} should start at 0");
        assert_eq!(percents.last(), Some(&100), "{phase} should end at 100");
        assert!(
            percents.windows(2).all(|w| w[0] < w[1]),
            "{phase} not increasing: {percents:?}"
        );
    }
    assert_eq!(sink.percents(Phase::Segment), vec![0, 25, 50, 75, 100]);
    assert_eq!(sink.percents(Phase::Transcribe), vec![0, 25, 50, 75, 100]);
}

#[tokio::test]
async fn test_ndjson_stream_for_full_job() {
    let media = Arc::new(SyntheticMedia::constant(60.0, 1000.0));
    let backend = Arc::new(MockBackend::new().echo());
    let server = serve_source(&media).await;
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media, backend, 30_000, root.path());

    let (mut sink, rx) = progress_channel(1024);
    let transport = NdjsonTransport::start(Vec::new(), rx);
    let result = pipeline
        .run(&episode_url(&server), &mut sink, &CancelFlag::new())
        .await;
    drop(sink);
    let out = transport.finish(&result).unwrap();

    let records: Vec<StreamRecord> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| StreamRecord::from_json(line).unwrap())
        .collect();

    let (last, progress) = records.split_last().unwrap();
    assert!(progress.iter().all(|r| matches!(r, StreamRecord::Progress { .. })));
    assert!(progress.contains(&StreamRecord::Progress {
        phase: Phase::Transcribe,
        percent: 100
    }));
    match last {
        StreamRecord::Result {
            transcript,
            segments,
            transcribed,
            ..
        } => {
            assert_eq!(transcript, "slice 0.000 30.000 slice 30.000 60.000");
            assert_eq!(*segments, 2);
            assert_eq!(*transcribed, 2);
        }
        other => panic!("expected a result record, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ndjson_stream_ends_with_error_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let media = Arc::new(SyntheticMedia::constant(60.0, 1000.0));
    let root = TempDir::new().unwrap();
    let pipeline = build_pipeline(media, Arc::new(MockBackend::new()), 30_000, root.path());

    let (mut sink, rx) = progress_channel(16);
    let transport = NdjsonTransport::start(Vec::new(), rx);
    let result = pipeline
        .run(&episode_url(&server), &mut sink, &CancelFlag::new())
        .await;
    drop(sink);
    let out = String::from_utf8(transport.finish(&result).unwrap()).unwrap();

    let last = out.lines().last().unwrap();
    match StreamRecord::from_json(last).unwrap() {
        StreamRecord::Error { kind, .. } => assert_eq!(kind, ErrorKind::DownloadFailed),
        other => panic!("expected an error record, got {other:?}"),
    }
}

#[tokio::test]
async fn test_base64_backend_segments_fit_payload_ceiling() {
    // Same ratio as the defaults: a 16 KB segment ceiling against a 20 KB
    // payload ceiling. Base64 inflates 16 KB segments past 20 KB, so the
    // pipeline must cut smaller segments instead of skipping them all.
    let mut config = Config::default();
    config.segment.max_segment_bytes = 16_000;
    config.transcribe.max_payload_bytes = 20_000;
    config.transcribe.retry_base_delay_ms = 1;
    config.transcribe.request_delay_ms = 0;
    let root = TempDir::new().unwrap();
    config.workspace.root = Some(root.path().to_path_buf());

    let media = Arc::new(SyntheticMedia::constant(31.0, 1000.0));
    let backend = Arc::new(MockBackend::new().echo().with_base64_sizing());
    let server = serve_source(&media).await;
    let runner: Arc<dyn CommandRunner> = media.clone();
    let dyn_backend: Arc<dyn TranscriptionBackend> = backend.clone();
    let pipeline = Pipeline::from_config(&config, runner, dyn_backend).unwrap();

    let mut job = Job::new(&episode_url(&server));
    let summary = pipeline
        .execute(&mut job, &mut CollectorSink::new(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.transcribed, summary.segments);
    assert_eq!(backend.calls().len(), summary.segments);
    assert!(job.segments().iter().all(|s| backend.encoded_len(s.bytes) <= 20_000));
    assert!(is_empty_dir(root.path()));
}
