use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use wortschatz::application::ports::EngineError;
use wortschatz::application::services::{
    AudioValidationError, EnqueueError, JobProcessor, PipelineError, QueueConfig, QueueEvent,
    TranscriptionQueue,
};
use wortschatz::domain::{EnqueueOptions, JobId, JobState, TranscriptionJob, VideoId};
use wortschatz::infrastructure::persistence::MockJobRepository;

fn quick_config() -> QueueConfig {
    QueueConfig {
        concurrency: 2,
        max_attempts: 3,
        backoff_base: Duration::from_millis(20),
        poll_interval: Duration::from_millis(10),
        heartbeat_interval: Duration::from_millis(50),
        stall_timeout: Duration::from_secs(60),
        retention_max_age: Duration::from_secs(3600),
        sweep_interval: Duration::from_secs(3600),
    }
}

fn queue_with(config: QueueConfig) -> TranscriptionQueue {
    TranscriptionQueue::new(Arc::new(MockJobRepository::new()), config)
}

async fn wait_for_state(
    queue: &TranscriptionQueue,
    id: JobId,
    state: JobState,
) -> TranscriptionJob {
    for _ in 0..500 {
        if let Some(job) = queue.job_detail(id).await.unwrap() {
            if job.state == state {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached {}", state);
}

async fn wait_for_completed_count(queue: &TranscriptionQueue, expected: u64) {
    for _ in 0..500 {
        if queue.status().await.unwrap().completed == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue never completed {} jobs", expected);
}

/// Succeeds after an optional delay, tracking peak concurrency and the
/// order videos were picked up in.
#[derive(Default)]
struct CountingProcessor {
    delay: Duration,
    running: AtomicUsize,
    max_observed: AtomicUsize,
    calls: AtomicUsize,
    order: Mutex<Vec<i64>>,
}

impl CountingProcessor {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl JobProcessor for CountingProcessor {
    async fn process(
        &self,
        job: &TranscriptionJob,
        progress: watch::Sender<u8>,
    ) -> Result<(), PipelineError> {
        let concurrent = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(concurrent, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(job.video_id.as_i64());

        let _ = progress.send(50);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every attempt with either a retryable engine error or a
/// non-retryable validation error.
struct FailingProcessor {
    calls: AtomicUsize,
    retryable: bool,
}

impl FailingProcessor {
    fn retryable() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            retryable: true,
        }
    }

    fn non_retryable() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            retryable: false,
        }
    }
}

#[async_trait]
impl JobProcessor for FailingProcessor {
    async fn process(
        &self,
        _job: &TranscriptionJob,
        _progress: watch::Sender<u8>,
    ) -> Result<(), PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.retryable {
            Err(PipelineError::Engine(EngineError::ExitFailure {
                code: 1,
                stderr: "engine blew up".to_string(),
            }))
        } else {
            Err(PipelineError::Validation(
                AudioValidationError::FileNotFound("audios/ghost.wav".to_string()),
            ))
        }
    }
}

/// Fails the first N attempts, then succeeds.
struct FlakyProcessor {
    failures: AtomicI64,
}

impl FlakyProcessor {
    fn failing_first(failures: i64) -> Self {
        Self {
            failures: AtomicI64::new(failures),
        }
    }
}

#[async_trait]
impl JobProcessor for FlakyProcessor {
    async fn process(
        &self,
        _job: &TranscriptionJob,
        _progress: watch::Sender<u8>,
    ) -> Result<(), PipelineError> {
        if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
            Err(PipelineError::Engine(EngineError::ExitFailure {
                code: 1,
                stderr: "flaky".to_string(),
            }))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn given_unsupported_language_when_enqueueing_then_rejected_without_record() {
    let queue = queue_with(quick_config());

    let result = queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/a.wav",
            "de",
            "es",
            EnqueueOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(EnqueueError::UnsupportedLanguage(_))));

    let status = queue.status().await.unwrap();
    assert_eq!(status.waiting, 0);
    assert_eq!(status.delayed, 0);
    assert_eq!(status.failed, 0);
}

#[tokio::test]
async fn given_always_failing_subprocess_when_processing_then_exactly_three_attempts() {
    let queue = queue_with(quick_config());
    let processor = Arc::new(FailingProcessor::retryable());

    let job_id = queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/a.wav",
            "de",
            "fr",
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    queue.start(processor.clone()).await;

    let job = wait_for_state(&queue, job_id, JobState::Failed).await;

    assert_eq!(processor.calls.load(Ordering::SeqCst), 3);
    assert_eq!(job.attempts_made, 3);
    assert!(job.failed_reason.unwrap().contains("engine blew up"));
    assert!(job.finished_at.is_some());

    queue.close().await;
}

#[tokio::test]
async fn given_non_retryable_failure_when_processing_then_single_attempt() {
    let queue = queue_with(quick_config());
    let processor = Arc::new(FailingProcessor::non_retryable());

    let job_id = queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/missing.wav",
            "de",
            "fr",
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    queue.start(processor.clone()).await;

    let job = wait_for_state(&queue, job_id, JobState::Failed).await;

    assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    assert_eq!(job.attempts_made, 1);

    queue.close().await;
}

#[tokio::test]
async fn given_five_jobs_when_concurrency_is_two_then_never_more_than_two_run() {
    let queue = queue_with(quick_config());
    let processor = Arc::new(CountingProcessor::with_delay(Duration::from_millis(100)));

    for video in 1..=5 {
        queue
            .enqueue(
                VideoId::from_i64(video),
                "audios/a.wav",
                "de",
                "fr",
                EnqueueOptions::default(),
            )
            .await
            .unwrap();
    }
    queue.start(processor.clone()).await;

    wait_for_completed_count(&queue, 5).await;

    assert_eq!(processor.calls.load(Ordering::SeqCst), 5);
    assert!(processor.max_observed.load(Ordering::SeqCst) <= 2);

    queue.close().await;
}

#[tokio::test]
async fn given_priorities_when_dispatching_then_higher_priority_runs_first() {
    let mut config = quick_config();
    config.concurrency = 1;
    let queue = queue_with(config);
    let processor = Arc::new(CountingProcessor::default());

    queue.pause();
    queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/a.wav",
            "de",
            "fr",
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    queue
        .enqueue(
            VideoId::from_i64(2),
            "audios/b.wav",
            "de",
            "fr",
            EnqueueOptions {
                priority: 5,
                delay: None,
            },
        )
        .await
        .unwrap();
    queue.start(processor.clone()).await;
    queue.resume();

    wait_for_completed_count(&queue, 2).await;

    assert_eq!(*processor.order.lock().unwrap(), vec![2, 1]);

    queue.close().await;
}

#[tokio::test]
async fn given_paused_queue_when_enqueueing_then_nothing_dispatches_until_resume() {
    let queue = queue_with(quick_config());
    let processor = Arc::new(CountingProcessor::default());

    queue.pause();
    queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/a.wav",
            "de",
            "fr",
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    queue.start(processor.clone()).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(queue.status().await.unwrap().waiting, 1);

    queue.resume();
    wait_for_completed_count(&queue, 1).await;

    queue.close().await;
}

#[tokio::test]
async fn given_delay_hint_when_enqueueing_then_job_parks_as_delayed() {
    let queue = queue_with(quick_config());
    let processor = Arc::new(CountingProcessor::default());

    let job_id = queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/a.wav",
            "de",
            "fr",
            EnqueueOptions {
                priority: 0,
                delay: Some(Duration::from_millis(300)),
            },
        )
        .await
        .unwrap();
    queue.start(processor.clone()).await;

    assert_eq!(queue.status().await.unwrap().delayed, 1);

    wait_for_state(&queue, job_id, JobState::Completed).await;

    queue.close().await;
}

#[tokio::test]
async fn given_terminally_failed_job_when_retrying_failed_then_job_runs_again() {
    let queue = queue_with(quick_config());
    // Three engine failures exhaust the budget; the fourth attempt succeeds.
    let processor = Arc::new(FlakyProcessor::failing_first(3));

    let job_id = queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/a.wav",
            "de",
            "fr",
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    queue.start(processor.clone()).await;

    wait_for_state(&queue, job_id, JobState::Failed).await;

    let requeued = queue.retry_failed().await.unwrap();
    assert_eq!(requeued, 1);

    let job = wait_for_state(&queue, job_id, JobState::Completed).await;
    assert_eq!(job.progress, 100);

    queue.close().await;
}

#[tokio::test]
async fn given_finished_jobs_when_cleaning_then_terminal_records_are_pruned() {
    let queue = queue_with(quick_config());
    let processor = Arc::new(CountingProcessor::default());

    let job_id = queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/a.wav",
            "de",
            "fr",
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    queue.start(processor).await;
    wait_for_state(&queue, job_id, JobState::Completed).await;

    let pruned = queue.clean(Duration::ZERO).await.unwrap();

    assert_eq!(pruned, 1);
    assert_eq!(queue.status().await.unwrap().completed, 0);
    assert!(queue.job_detail(job_id).await.unwrap().is_none());

    queue.close().await;
}

#[tokio::test]
async fn given_running_job_when_listening_then_progress_and_completion_events_arrive() {
    let queue = queue_with(quick_config());
    let processor = Arc::new(CountingProcessor::with_delay(Duration::from_millis(50)));
    let mut events = queue.events();

    let job_id = queue
        .enqueue(
            VideoId::from_i64(7),
            "audios/a.wav",
            "de",
            "fr",
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    queue.start(processor).await;
    wait_for_state(&queue, job_id, JobState::Completed).await;

    let mut saw_progress = false;
    let mut saw_completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            QueueEvent::Progress { video_id, percent, .. } => {
                assert_eq!(video_id.as_i64(), 7);
                assert_eq!(percent, 50);
                saw_progress = true;
            }
            QueueEvent::Completed { video_id, .. } => {
                assert_eq!(video_id.as_i64(), 7);
                saw_completed = true;
            }
            _ => {}
        }
    }
    assert!(saw_progress);
    assert!(saw_completed);

    queue.close().await;
}

#[tokio::test]
async fn given_worker_without_heartbeat_when_sweeping_then_stall_is_reported() {
    let config = QueueConfig {
        concurrency: 1,
        heartbeat_interval: Duration::from_secs(3600),
        stall_timeout: Duration::from_millis(50),
        sweep_interval: Duration::from_millis(100),
        ..quick_config()
    };
    let queue = queue_with(config);
    let processor = Arc::new(CountingProcessor::with_delay(Duration::from_millis(600)));
    let mut events = queue.events();

    let job_id = queue
        .enqueue(
            VideoId::from_i64(1),
            "audios/a.wav",
            "de",
            "fr",
            EnqueueOptions::default(),
        )
        .await
        .unwrap();
    queue.start(processor).await;

    let mut saw_stalled = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
            Ok(Ok(QueueEvent::Stalled { video_id, .. })) => {
                assert_eq!(video_id.as_i64(), 1);
                saw_stalled = true;
                break;
            }
            Ok(Ok(_)) => {}
            Ok(Err(_)) => break,
            Err(_) => {}
        }
    }
    assert!(saw_stalled, "no stall event observed");

    wait_for_state(&queue, job_id, JobState::Completed).await;
    queue.close().await;
}
