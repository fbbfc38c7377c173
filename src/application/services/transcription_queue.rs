use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::application::ports::{JobRepository, RepositoryError, VideoRepository};
use crate::domain::{
    EnqueueOptions, JobId, Language, TranscriptionJob, UnsupportedLanguage, VideoId,
};

use super::pipeline_worker::JobProcessor;

/// Language pair assumed when the caller does not say otherwise.
pub const DEFAULT_SOURCE_LANG: &str = "de";
pub const DEFAULT_TARGET_LANG: &str = "fr";

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How many subprocesses may run at once.
    pub concurrency: usize,
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt already made.
    pub backoff_base: Duration,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// An active job without a heartbeat for this long is reported stalled.
    pub stall_timeout: Duration,
    /// Terminal job records older than this are pruned by the sweeper.
    pub retention_max_age: Duration,
    pub sweep_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
            heartbeat_interval: Duration::from_secs(5),
            stall_timeout: Duration::from_secs(30),
            retention_max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Emitted on every job state transition, for operational tracing.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Completed {
        video_id: VideoId,
        job_id: JobId,
    },
    Failed {
        video_id: VideoId,
        job_id: JobId,
        reason: String,
        will_retry: bool,
    },
    Progress {
        video_id: VideoId,
        job_id: JobId,
        percent: u8,
    },
    Stalled {
        video_id: VideoId,
        job_id: JobId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
    pub concurrency: usize,
}

/// A durable work queue over the job repository: bounded concurrency,
/// retry with exponential backoff, stall detection and retention pruning.
/// Constructed explicitly with its configuration and started/closed by the
/// owner; there is no global instance.
pub struct TranscriptionQueue {
    shared: QueueShared,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Everything the background loops need, cheap to clone per task.
#[derive(Clone)]
struct QueueShared {
    repo: Arc<dyn JobRepository>,
    config: QueueConfig,
    semaphore: Arc<Semaphore>,
    paused: Arc<AtomicBool>,
    events: broadcast::Sender<QueueEvent>,
}

impl QueueShared {
    fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }
}

impl TranscriptionQueue {
    pub fn new(repo: Arc<dyn JobRepository>, config: QueueConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        let (shutdown, _) = watch::channel(false);
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        Self {
            shared: QueueShared {
                repo,
                config,
                semaphore,
                paused: Arc::new(AtomicBool::new(false)),
                events,
            },
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Creates the durable job record. Languages are validated before any
    /// queue entry exists; an unsupported one never reaches the repository.
    pub async fn enqueue(
        &self,
        video_id: VideoId,
        audio_path: &str,
        source_lang: &str,
        target_lang: &str,
        options: EnqueueOptions,
    ) -> Result<JobId, EnqueueError> {
        let source = source_lang.parse::<Language>()?;
        let target = target_lang.parse::<Language>()?;

        let job = TranscriptionJob::new(
            video_id,
            audio_path.to_string(),
            source,
            target,
            self.shared.config.max_attempts,
            options,
        );
        let job_id = job.id;
        self.shared.repo.create(&job).await?;

        tracing::info!(
            video_id = %video_id,
            job_id = %job_id.as_uuid(),
            source = %source,
            target = %target,
            priority = options.priority,
            "Transcription job enqueued"
        );
        Ok(job_id)
    }

    /// Re-enqueues processing for a video, reusing the parameters of its
    /// most recent job when one is still on record.
    pub async fn retry_video(
        &self,
        ledger: &dyn VideoRepository,
        video_id: VideoId,
    ) -> Result<JobId, EnqueueError> {
        if let Some(previous) = self.shared.repo.latest_for_video(video_id).await? {
            return self
                .enqueue(
                    video_id,
                    &previous.audio_path,
                    previous.source_lang.as_str(),
                    previous.target_lang.as_str(),
                    EnqueueOptions::default(),
                )
                .await;
        }

        let video = ledger
            .get(video_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("video {}", video_id)))?;
        self.enqueue(
            video_id,
            &video.storage_path,
            video.language.as_str(),
            DEFAULT_TARGET_LANG,
            EnqueueOptions::default(),
        )
        .await
    }

    /// Spawns the dispatcher and maintenance sweeper.
    pub async fn start(&self, processor: Arc<dyn JobProcessor>) {
        let dispatcher = tokio::spawn(dispatch_loop(
            self.shared.clone(),
            self.shutdown.subscribe(),
            processor,
        ));
        let sweeper = tokio::spawn(sweep_loop(self.shared.clone(), self.shutdown.subscribe()));
        self.tasks.lock().await.extend([dispatcher, sweeper]);
        tracing::info!(
            concurrency = self.shared.config.concurrency,
            max_attempts = self.shared.config.max_attempts,
            "Transcription queue started"
        );
    }

    /// Stops dispatching and waits for in-flight jobs to finish.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
        let _ = self
            .shared
            .semaphore
            .acquire_many(self.shared.config.concurrency as u32)
            .await;
        tracing::info!("Transcription queue stopped");
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        tracing::info!("Queue paused");
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        tracing::info!("Queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> Result<QueueStatus, RepositoryError> {
        let counts = self.shared.repo.counts().await?;
        Ok(QueueStatus {
            waiting: counts.waiting,
            active: counts.active,
            completed: counts.completed,
            failed: counts.failed,
            delayed: counts.delayed,
            concurrency: self.shared.config.concurrency,
        })
    }

    pub async fn job_detail(&self, id: JobId) -> Result<Option<TranscriptionJob>, RepositoryError> {
        self.shared.repo.get_by_id(id).await
    }

    /// Administratively re-attempts every currently failed job.
    pub async fn retry_failed(&self) -> Result<u64, RepositoryError> {
        let requeued = self.shared.repo.retry_failed().await?;
        if requeued > 0 {
            tracing::info!(requeued, "Re-queued failed jobs");
        }
        Ok(requeued)
    }

    /// Forces pruning of terminal records beyond the given age.
    pub async fn clean(&self, max_age: Duration) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).unwrap_or_default();
        let pruned = self.shared.repo.prune_finished(cutoff).await?;
        tracing::info!(pruned, "Queue cleaned");
        Ok(pruned)
    }

    pub fn events(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }
}

async fn dispatch_loop(
    shared: QueueShared,
    mut shutdown: watch::Receiver<bool>,
    processor: Arc<dyn JobProcessor>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(shared.config.poll_interval) => {}
        }
        if *shutdown.borrow() {
            break;
        }
        if shared.paused.load(Ordering::SeqCst) {
            continue;
        }

        let free = shared.semaphore.available_permits();
        if free == 0 {
            continue;
        }

        let due = match shared.repo.fetch_due(Utc::now(), free).await {
            Ok(due) => due,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch due jobs");
                continue;
            }
        };

        for job in due {
            let permit = match Arc::clone(&shared.semaphore).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if let Err(e) = shared.repo.mark_active(job.id).await {
                tracing::warn!(job_id = %job.id.as_uuid(), error = %e, "Failed to claim job");
                continue;
            }

            let span = tracing::info_span!(
                "transcription_job",
                job_id = %job.id.as_uuid(),
                video_id = %job.video_id,
                attempt = job.attempts_made + 1,
            );
            let shared = shared.clone();
            let processor = Arc::clone(&processor);
            tokio::spawn(
                async move {
                    let _permit = permit;
                    run_attempt(shared, processor, job).await;
                }
                .instrument(span),
            );
        }
    }

    tracing::info!("Queue dispatcher stopped");
}

/// One execution attempt: drives the processor while heartbeating the job
/// record and forwarding progress, then settles the outcome against the
/// retry policy.
async fn run_attempt(
    shared: QueueShared,
    processor: Arc<dyn JobProcessor>,
    mut job: TranscriptionJob,
) {
    // Mirrors what mark_active already recorded.
    job.attempts_made += 1;
    let attempt = job.attempts_made;

    let (progress_tx, mut progress_rx) = watch::channel(0u8);

    let result = {
        let mut process = Box::pin(processor.process(&job, progress_tx));
        let mut heartbeat = tokio::time::interval(shared.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut progress_open = true;

        loop {
            tokio::select! {
                result = &mut process => break result,
                _ = heartbeat.tick() => {
                    if let Err(e) = shared.repo.heartbeat(job.id).await {
                        tracing::warn!(error = %e, "Heartbeat write failed");
                    }
                }
                changed = progress_rx.changed(), if progress_open => {
                    match changed {
                        Ok(()) => {
                            let percent = *progress_rx.borrow_and_update();
                            if let Err(e) = shared.repo.update_progress(job.id, percent).await {
                                tracing::warn!(error = %e, "Progress write failed");
                            }
                            shared.emit(QueueEvent::Progress {
                                video_id: job.video_id,
                                job_id: job.id,
                                percent,
                            });
                            tracing::debug!(percent, "Job progress");
                        }
                        Err(_) => progress_open = false,
                    }
                }
            }
        }
    };

    match result {
        Ok(()) => {
            if let Err(e) = shared.repo.complete(job.id).await {
                tracing::error!(error = %e, "Failed to record job completion");
            }
            shared.emit(QueueEvent::Completed {
                video_id: job.video_id,
                job_id: job.id,
            });
            tracing::info!("Job completed");
        }
        Err(e) => {
            let reason = e.to_string();
            let will_retry = e.is_retryable() && attempt < job.max_attempts;
            let retry_at = if will_retry {
                let delay = job.backoff_delay(shared.config.backoff_base);
                Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default())
            } else {
                None
            };

            if let Err(db_err) = shared.repo.record_failure(job.id, &reason, retry_at).await {
                tracing::error!(error = %db_err, "Failed to record job failure");
            }
            shared.emit(QueueEvent::Failed {
                video_id: job.video_id,
                job_id: job.id,
                reason: reason.clone(),
                will_retry,
            });

            if will_retry {
                tracing::warn!(
                    error = %reason,
                    attempt,
                    max_attempts = job.max_attempts,
                    "Job attempt failed, will retry"
                );
            } else {
                tracing::error!(error = %reason, attempt, "Job terminally failed");
            }
        }
    }
}

/// Reports stalled jobs and prunes terminal records past retention.
async fn sweep_loop(shared: QueueShared, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(shared.config.sweep_interval) => {}
        }
        if *shutdown.borrow() {
            break;
        }

        let stall_cutoff = Utc::now()
            - chrono::Duration::from_std(shared.config.stall_timeout).unwrap_or_default();
        match shared.repo.find_stalled(stall_cutoff).await {
            Ok(stalled) => {
                for job in stalled {
                    tracing::warn!(
                        video_id = %job.video_id,
                        job_id = %job.id.as_uuid(),
                        "Job stalled: worker stopped heartbeating"
                    );
                    shared.emit(QueueEvent::Stalled {
                        video_id: job.video_id,
                        job_id: job.id,
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, "Stall scan failed"),
        }

        let retention_cutoff = Utc::now()
            - chrono::Duration::from_std(shared.config.retention_max_age).unwrap_or_default();
        match shared.repo.prune_finished(retention_cutoff).await {
            Ok(pruned) if pruned > 0 => tracing::debug!(pruned, "Pruned terminal job records"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Retention pruning failed"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
}
