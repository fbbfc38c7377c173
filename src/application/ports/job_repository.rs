use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{JobId, JobState, TranscriptionJob, VideoId};

use super::RepositoryError;

/// Aggregated live counts per queue state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
}

/// Durable storage for the queue's job records.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &TranscriptionJob) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: JobId) -> Result<Option<TranscriptionJob>, RepositoryError>;

    /// Most recently created job for a video, if any record survives.
    async fn latest_for_video(
        &self,
        video_id: VideoId,
    ) -> Result<Option<TranscriptionJob>, RepositoryError>;

    /// Jobs ready to dispatch: `WAITING`, or `DELAYED` with `run_at <= now`,
    /// ordered by priority descending then creation time.
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TranscriptionJob>, RepositoryError>;

    /// Begins an attempt: sets `ACTIVE`, increments `attempts_made`, stamps
    /// `processed_at` on the first attempt and refreshes the heartbeat.
    async fn mark_active(&self, id: JobId) -> Result<(), RepositoryError>;

    async fn heartbeat(&self, id: JobId) -> Result<(), RepositoryError>;

    async fn update_progress(&self, id: JobId, progress: u8) -> Result<(), RepositoryError>;

    async fn complete(&self, id: JobId) -> Result<(), RepositoryError>;

    /// Records a failed attempt. `retry_at = Some` re-parks the job as
    /// `DELAYED` for another attempt; `None` is terminal `FAILED`. The last
    /// error is retained as `failed_reason` either way.
    async fn record_failure(
        &self,
        id: JobId,
        reason: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;

    async fn counts(&self) -> Result<QueueCounts, RepositoryError>;

    async fn list_by_state(&self, state: JobState)
        -> Result<Vec<TranscriptionJob>, RepositoryError>;

    /// Re-queues every `FAILED` job with a fresh attempt budget; returns how
    /// many were re-queued.
    async fn retry_failed(&self) -> Result<u64, RepositoryError>;

    /// Deletes terminal (completed/failed) records finished before the
    /// cutoff; returns how many were pruned.
    async fn prune_finished(&self, finished_before: DateTime<Utc>) -> Result<u64, RepositoryError>;

    /// Active jobs whose heartbeat is older than the cutoff — a worker died
    /// mid-job without reporting.
    async fn find_stalled(
        &self,
        heartbeat_before: DateTime<Utc>,
    ) -> Result<Vec<TranscriptionJob>, RepositoryError>;
}
