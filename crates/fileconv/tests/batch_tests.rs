//! End-to-end batch behavior with process runner doubles.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    test_config, CancellingRunner, FailingRunner, PanickingRunner, PartialWriteRunner,
    SelectiveRunner, SuccessRunner, TestHarness,
};
use fileconv::report::EntryState;
use fileconv::{
    BatchConfig, BatchError, BatchId, BatchOrchestrator, BatchProgressEvent, BroadcastProgress,
    CapabilityDescriptor, ConflictPolicy, ConversionError, ConversionOptions, ConverterRegistry,
    OutputFormat, SourceCategory, TaskStatus,
};

fn statuses(report: &fileconv::ResultReport) -> Vec<Option<TaskStatus>> {
    report.entries.iter().map(|e| e.status()).collect()
}

#[tokio::test]
async fn test_report_has_one_entry_per_task_in_submission_order() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::new());
    let orchestrator = harness.orchestrator(runner.clone());

    let tasks = vec![
        harness.task("scan.png", OutputFormat::Jpeg),
        harness.task("talk.mp4", OutputFormat::Webm),
        harness.task("notes.docx", OutputFormat::Pdf),
        harness.task("song.wav", OutputFormat::Mp3),
        harness.task("logo.gif", OutputFormat::Png),
    ];
    let ids: Vec<_> = tasks.iter().map(|t| t.id().clone()).collect();

    let report = orchestrator.submit(tasks, 3).unwrap().wait().await;

    assert!(report.finished);
    assert_eq!(report.entries.len(), 5);
    let reported: Vec<_> = report.entries.iter().map(|e| e.task_id.clone()).collect();
    assert_eq!(reported, ids);
    assert_eq!(report.counts.succeeded, 5);
    assert_eq!(report.counts.total, 5);
    assert_eq!(runner.calls(), 5);
}

#[tokio::test]
async fn test_round_trip_writes_output_next_to_requested_directory() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(SuccessRunner::new()));

    let task = harness.task("a.png", OutputFormat::Jpeg);
    let report = orchestrator.submit(vec![task], 1).unwrap().wait().await;

    let outcome = report.entries[0].outcome.clone().unwrap();
    let expected = harness.output_dir.join("a.jpeg");
    assert_eq!(outcome.status, TaskStatus::Succeeded);
    assert_eq!(outcome.output_path.as_deref(), Some(expected.as_path()));
    assert!(expected.exists());
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn test_document_output_is_moved_out_of_staging() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(SuccessRunner::new()));

    let task = harness.task("report.docx", OutputFormat::Pdf);
    let report = orchestrator.submit(vec![task], 1).unwrap().wait().await;

    assert_eq!(report.counts.succeeded, 1);
    assert!(harness.output_dir.join("report.pdf").exists());

    let leftovers: Vec<_> = std::fs::read_dir(&harness.output_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".fileconv-"))
        .collect();
    assert!(leftovers.is_empty(), "staging directory was not removed");
}

#[tokio::test]
async fn test_unsupported_conversion_never_launches_a_tool() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::new());
    let registry = ConverterRegistry::from_descriptors([CapabilityDescriptor::new(
        SourceCategory::Image,
        OutputFormat::Png,
    )]);
    let orchestrator = BatchOrchestrator::new(Arc::new(registry), runner.clone(), test_config());

    let task = harness.task("song.wav", OutputFormat::Mp3);
    let report = orchestrator.submit(vec![task], 2).unwrap().wait().await;

    let outcome = report.entries[0].outcome.clone().unwrap();
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert!(matches!(
        outcome.error,
        Some(ConversionError::UnsupportedConversion {
            category: SourceCategory::Audio,
            format: OutputFormat::Mp3,
        })
    ));
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_invalid_options_fail_before_launch() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::new());
    let orchestrator = harness.orchestrator(runner.clone());

    let task = harness
        .task("photo.png", OutputFormat::Webp)
        .with_options(ConversionOptions::new().with("fps", "30"));
    let report = orchestrator.submit(vec![task], 1).unwrap().wait().await;

    let outcome = report.entries[0].outcome.clone().unwrap();
    assert!(matches!(
        outcome.error,
        Some(ConversionError::InvalidOptions { ref key, .. }) if key == "fps"
    ));
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn test_failing_task_does_not_affect_the_others() {
    let control_harness = TestHarness::new();
    let control = control_harness
        .orchestrator(Arc::new(SuccessRunner::new()))
        .submit(
            vec![
                control_harness.task("first.png", OutputFormat::Jpeg),
                control_harness.task("third.png", OutputFormat::Jpeg),
            ],
            2,
        )
        .unwrap()
        .wait()
        .await;

    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(SelectiveRunner::failing_on("broken")));
    let report = orchestrator
        .submit(
            vec![
                harness.task("first.png", OutputFormat::Jpeg),
                harness.task("broken.png", OutputFormat::Jpeg),
                harness.task("third.png", OutputFormat::Jpeg),
            ],
            2,
        )
        .unwrap()
        .wait()
        .await;

    let failed = report.entries[1].outcome.clone().unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
    match failed.error {
        Some(ConversionError::ExternalToolFailure {
            exit_code,
            diagnostics,
            ..
        }) => {
            assert_eq!(exit_code, Some(1));
            assert!(diagnostics.contains("unsupported pixel format"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(report.entries[0].status(), control.entries[0].status());
    assert_eq!(report.entries[2].status(), control.entries[1].status());
    assert!(harness.output_dir.join("first.jpeg").exists());
    assert!(harness.output_dir.join("third.jpeg").exists());
    assert!(!harness.output_dir.join("broken.jpeg").exists());
}

#[tokio::test]
async fn test_cancel_leaves_remaining_tasks_cancelled() {
    let harness = TestHarness::new();
    let runner = Arc::new(CancellingRunner::new(2));
    let orchestrator = harness.orchestrator(runner.clone());

    let tasks: Vec<_> = (0..6)
        .map(|i| harness.task(&format!("img{}.png", i), OutputFormat::Jpeg))
        .collect();
    let handle = orchestrator.submit(tasks, 1).unwrap();
    runner.attach(handle.clone());

    let report = handle.wait().await;

    assert!(report.cancel_requested);
    assert_eq!(
        statuses(&report),
        vec![
            Some(TaskStatus::Succeeded),
            Some(TaskStatus::Succeeded),
            Some(TaskStatus::Cancelled),
            Some(TaskStatus::Cancelled),
            Some(TaskStatus::Cancelled),
            Some(TaskStatus::Cancelled),
        ]
    );
    assert_eq!(runner.calls(), 2);
    assert_eq!(report.counts.finished(), 6);
}

#[tokio::test]
async fn test_cancel_stops_a_running_conversion() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(SuccessRunner::with_delay(
        Duration::from_secs(30),
    )));

    let task = harness.task("movie.mov", OutputFormat::Mp4);
    let handle = orchestrator.submit(vec![task], 1).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator.cancel(handle.id()).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("cancelled batch did not finish");
    assert_eq!(statuses(&report), vec![Some(TaskStatus::Cancelled)]);
    assert!(!harness.output_dir.join("movie.mp4").exists());
}

#[tokio::test]
async fn test_cancel_with_several_workers_keeps_unstarted_tasks_unlaunched() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::with_delay(Duration::from_secs(30)));
    let orchestrator = harness.orchestrator(runner.clone());
    let workers = 2.min(num_cpus::get());

    let tasks: Vec<_> = (0..6)
        .map(|i| harness.task(&format!("reel{}.avi", i), OutputFormat::Mp4))
        .collect();
    let handle = orchestrator.submit(tasks, 2).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("cancelled batch did not finish");

    assert_eq!(statuses(&report), vec![Some(TaskStatus::Cancelled); 6]);
    assert_eq!(runner.calls(), workers);
    let attempts: Vec<u32> = report
        .entries
        .iter()
        .map(|e| e.outcome.as_ref().map_or(0, |o| o.attempts))
        .collect();
    assert!(attempts[..workers].iter().all(|&a| a == 1), "{:?}", attempts);
    assert!(attempts[workers..].iter().all(|&a| a == 0), "{:?}", attempts);
    assert_eq!(report.counts.cancelled, 6);
}

#[tokio::test]
async fn test_snapshot_while_running_shows_running_entries() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::with_delay(Duration::from_millis(300)));
    let orchestrator = harness.orchestrator(runner.clone());
    let workers = 2.min(num_cpus::get());

    let tasks: Vec<_> = (0..4)
        .map(|i| harness.task(&format!("page{}.bmp", i), OutputFormat::Png))
        .collect();
    let handle = orchestrator.submit(tasks, 2).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = handle.progress();

    assert!(!snapshot.finished);
    assert_eq!(snapshot.counts.total, 4);
    assert_eq!(snapshot.counts.running, workers);
    assert_eq!(snapshot.counts.pending, 4 - workers);
    assert_eq!(snapshot.counts.finished(), 0);
    assert_eq!(
        snapshot.counts.pending + snapshot.counts.running + snapshot.counts.finished(),
        snapshot.counts.total
    );
    let states: Vec<EntryState> = snapshot.entries.iter().map(|e| e.state).collect();
    assert!(states[..workers].iter().all(|s| *s == EntryState::Running));
    assert!(states[workers..].iter().all(|s| *s == EntryState::Pending));
    assert!(snapshot.entries.iter().all(|e| e.outcome.is_none()));

    let report = handle.wait().await;
    assert_eq!(report.counts.succeeded, 4);
    assert_eq!(report.counts.running, 0);
}

#[tokio::test]
async fn test_panicking_conversion_fails_only_its_own_task() {
    let harness = TestHarness::new();
    let runner = Arc::new(PanickingRunner::new());
    let orchestrator = harness.orchestrator(runner.clone());

    let tasks = vec![
        harness.task("first.png", OutputFormat::Jpeg),
        harness.task("second.png", OutputFormat::Jpeg),
        harness.task("third.png", OutputFormat::Jpeg),
    ];
    let report = orchestrator.submit(tasks, 1).unwrap().wait().await;

    assert_eq!(
        statuses(&report),
        vec![
            Some(TaskStatus::Failed),
            Some(TaskStatus::Succeeded),
            Some(TaskStatus::Succeeded),
        ]
    );
    match &report.entries[0].outcome.as_ref().unwrap().error {
        Some(ConversionError::Internal { message }) => {
            assert!(message.contains("decoder state corrupted"), "{}", message)
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(runner.calls(), 3);
    assert!(harness.output_dir.join("second.jpeg").exists());
}

#[tokio::test]
async fn test_timed_out_conversion_leaves_no_partial_output() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(PartialWriteRunner::slow(
        Duration::from_millis(200),
    )));

    let task = harness
        .task("lecture.mkv", OutputFormat::Mp4)
        .with_timeout(Duration::from_millis(10));
    let report = orchestrator.submit(vec![task], 1).unwrap().wait().await;

    let outcome = report.entries[0].outcome.clone().unwrap();
    assert!(outcome.is_timeout());
    assert!(!harness.output_dir.join("lecture.mp4").exists());
}

#[tokio::test]
async fn test_cancelled_conversion_leaves_no_partial_output() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(PartialWriteRunner::slow(
        Duration::from_secs(30),
    )));

    let handle = orchestrator
        .submit(vec![harness.task("lecture.mkv", OutputFormat::Mp4)], 1)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.output_dir.join("lecture.mp4").exists());
    handle.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("cancelled batch did not finish");
    assert_eq!(statuses(&report), vec![Some(TaskStatus::Cancelled)]);
    assert!(!harness.output_dir.join("lecture.mp4").exists());
}

#[tokio::test]
async fn test_failed_conversion_leaves_no_partial_output() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(PartialWriteRunner::failing()));

    let task = harness.task("lecture.mkv", OutputFormat::Mp4);
    let report = orchestrator.submit(vec![task], 1).unwrap().wait().await;

    let outcome = report.entries[0].outcome.clone().unwrap();
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert!(matches!(
        outcome.error,
        Some(ConversionError::ExternalToolFailure { .. })
    ));
    assert!(!harness.output_dir.join("lecture.mp4").exists());
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::with_delay(Duration::from_millis(20)));
    let orchestrator = harness.orchestrator(runner.clone());

    let tasks: Vec<_> = (0..12)
        .map(|i| harness.task(&format!("frame{:02}.png", i), OutputFormat::Webp))
        .collect();
    let report = orchestrator.submit(tasks, 3).unwrap().wait().await;

    assert_eq!(report.counts.succeeded, 12);
    assert!(runner.max_running() >= 1);
    assert!(
        runner.max_running() <= 3,
        "saw {} conversions at once",
        runner.max_running()
    );
}

#[tokio::test]
async fn test_timeout_fails_the_task() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::with_delay(Duration::from_millis(100)));
    let config = BatchConfig {
        retries: 2,
        ..test_config()
    };
    let orchestrator = harness.orchestrator_with(runner.clone(), config);

    let task = harness
        .task("clip.mkv", OutputFormat::Mp4)
        .with_timeout(Duration::from_millis(10));
    let report = orchestrator.submit(vec![task], 1).unwrap().wait().await;

    let outcome = report.entries[0].outcome.clone().unwrap();
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert!(outcome.is_timeout());
    match outcome.error {
        Some(ConversionError::Timeout { deadline, .. }) => {
            assert_eq!(deadline, Duration::from_millis(10))
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // Timeouts are not retried.
    assert_eq!(runner.calls(), 1);
}

#[tokio::test]
async fn test_tool_failures_are_retried() {
    let harness = TestHarness::new();
    let runner = Arc::new(FailingRunner::new());
    let config = BatchConfig {
        retries: 2,
        ..test_config()
    };
    let orchestrator = harness.orchestrator_with(runner.clone(), config);

    let task = harness.task("voice.ogg", OutputFormat::Wav);
    let report = orchestrator.submit(vec![task], 1).unwrap().wait().await;

    let outcome = report.entries[0].outcome.clone().unwrap();
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(runner.calls(), 3);
}

#[tokio::test]
async fn test_same_stem_outputs_are_renamed() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(SuccessRunner::new()));

    let report = orchestrator
        .submit(
            vec![
                harness.task("cover.png", OutputFormat::Jpeg),
                harness.task("cover.bmp", OutputFormat::Jpeg),
            ],
            2,
        )
        .unwrap()
        .wait()
        .await;

    let outputs: Vec<_> = report
        .entries
        .iter()
        .map(|e| e.outcome.clone().unwrap().output_path.unwrap())
        .collect();
    assert_eq!(
        outputs,
        vec![
            harness.output_dir.join("cover.jpeg"),
            harness.output_dir.join("cover_2.jpeg"),
        ]
    );
}

#[tokio::test]
async fn test_fail_policy_rejects_existing_output() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::new());
    let config = BatchConfig {
        conflict_policy: ConflictPolicy::Fail,
        ..test_config()
    };
    let orchestrator = harness.orchestrator_with(runner.clone(), config);

    std::fs::create_dir_all(&harness.output_dir).unwrap();
    std::fs::write(harness.output_dir.join("taken.pdf"), b"old").unwrap();

    let task = harness.task("taken.odt", OutputFormat::Pdf);
    let report = orchestrator.submit(vec![task], 1).unwrap().wait().await;

    let outcome = report.entries[0].outcome.clone().unwrap();
    assert!(matches!(
        outcome.error,
        Some(ConversionError::OutputExists { .. })
    ));
    assert_eq!(runner.calls(), 0);
    assert_eq!(
        std::fs::read(harness.output_dir.join("taken.pdf")).unwrap(),
        b"old"
    );
}

#[tokio::test]
async fn test_progress_events_cover_every_task() {
    let harness = TestHarness::new();
    let progress = Arc::new(BroadcastProgress::new());
    let mut events = progress.subscribe();
    let orchestrator = harness
        .orchestrator(Arc::new(SuccessRunner::new()))
        .with_progress(progress.clone());

    let tasks: Vec<_> = (0..4)
        .map(|i| harness.task(&format!("track{}.flac", i), OutputFormat::Mp3))
        .collect();
    let handle = orchestrator.submit(tasks, 2).unwrap();
    let report = handle.wait().await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    let started = received
        .iter()
        .filter(|e| matches!(e, BatchProgressEvent::TaskStarted { .. }))
        .count();
    let finished = received
        .iter()
        .filter(|e| matches!(e, BatchProgressEvent::TaskFinished { .. }))
        .count();
    assert_eq!(started, 4);
    assert_eq!(finished, 4);
    assert!(received.iter().all(|e| e.batch_id() == &report.batch_id));
    assert!(matches!(
        received.last(),
        Some(BatchProgressEvent::BatchFinished { cancelled: false, .. })
    ));
}

#[tokio::test]
async fn test_progress_and_wait_through_the_orchestrator() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(SuccessRunner::new()));

    let handle = orchestrator
        .submit(vec![harness.task("a.tiff", OutputFormat::Png)], 1)
        .unwrap();
    let batch_id = handle.id().clone();

    let snapshot = orchestrator.progress(&batch_id).unwrap();
    assert_eq!(snapshot.counts.total, 1);

    let report = orchestrator.wait(&batch_id).await.unwrap();
    assert!(report.finished);
    assert!(handle.is_finished());

    // Waiting through the orchestrator also stops tracking the batch.
    assert_eq!(orchestrator.tracked(), 0);
    assert!(matches!(
        orchestrator.progress(&batch_id),
        Err(BatchError::UnknownBatch(_))
    ));
    assert!(orchestrator.forget(&batch_id).is_none());

    // The handle still works, and cancelling a finished batch changes nothing.
    handle.cancel();
    let after = handle.progress();
    assert!(!after.cancel_requested);
    assert_eq!(statuses(&after), vec![Some(TaskStatus::Succeeded)]);
}

#[tokio::test]
async fn test_forget_drops_batches_waited_on_through_the_handle() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(SuccessRunner::new()));

    let handle = orchestrator
        .submit(vec![harness.task("b.tiff", OutputFormat::Png)], 1)
        .unwrap();
    assert_eq!(orchestrator.tracked(), 1);

    handle.wait().await;
    assert_eq!(orchestrator.tracked(), 1);
    assert!(orchestrator.forget(handle.id()).is_some());
    assert_eq!(orchestrator.tracked(), 0);
}

#[tokio::test]
async fn test_submit_rejects_bad_requests() {
    let harness = TestHarness::new();
    let runner = Arc::new(SuccessRunner::new());
    let orchestrator = harness.orchestrator(runner.clone());

    assert!(matches!(
        orchestrator.submit(Vec::new(), 4),
        Err(BatchError::EmptyBatch)
    ));
    assert!(matches!(
        orchestrator.submit(vec![harness.task("x.png", OutputFormat::Gif)], 0),
        Err(BatchError::InvalidConcurrency)
    ));
    assert!(matches!(
        orchestrator.progress(&BatchId::new()),
        Err(BatchError::UnknownBatch(_))
    ));
    assert_eq!(runner.calls(), 0);
}

#[test]
fn test_submit_requires_a_runtime() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(Arc::new(SuccessRunner::new()));

    let result = orchestrator.submit(vec![harness.task("x.png", OutputFormat::Gif)], 1);
    assert!(matches!(result, Err(BatchError::RuntimeUnavailable)));
}
