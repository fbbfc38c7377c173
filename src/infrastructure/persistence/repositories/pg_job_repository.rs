use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{JobRepository, QueueCounts, RepositoryError};
use crate::domain::{JobId, JobState, Language, TranscriptionJob, VideoId};

const JOB_COLUMNS: &str = "id, video_id, audio_path, source_lang, target_lang, priority, state, \
     attempts_made, max_attempts, progress, failed_reason, run_at, heartbeat_at, created_at, \
     processed_at, finished_at";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn map_job(row: &PgRow) -> Result<TranscriptionJob, RepositoryError> {
    let state: String = row.try_get("state").map_err(query_failed)?;
    let source_lang: String = row.try_get("source_lang").map_err(query_failed)?;
    let target_lang: String = row.try_get("target_lang").map_err(query_failed)?;

    Ok(TranscriptionJob {
        id: JobId::from_uuid(row.try_get::<Uuid, _>("id").map_err(query_failed)?),
        video_id: VideoId::from_i64(row.try_get("video_id").map_err(query_failed)?),
        audio_path: row.try_get("audio_path").map_err(query_failed)?,
        source_lang: Language::from_str(&source_lang).map_err(query_failed)?,
        target_lang: Language::from_str(&target_lang).map_err(query_failed)?,
        priority: row.try_get("priority").map_err(query_failed)?,
        state: state.parse::<JobState>().map_err(RepositoryError::QueryFailed)?,
        attempts_made: row.try_get::<i32, _>("attempts_made").map_err(query_failed)? as u32,
        max_attempts: row.try_get::<i32, _>("max_attempts").map_err(query_failed)? as u32,
        progress: row.try_get::<i32, _>("progress").map_err(query_failed)?.clamp(0, 100) as u8,
        failed_reason: row.try_get("failed_reason").map_err(query_failed)?,
        run_at: row.try_get("run_at").map_err(query_failed)?,
        heartbeat_at: row.try_get("heartbeat_at").map_err(query_failed)?,
        created_at: row.try_get("created_at").map_err(query_failed)?,
        processed_at: row.try_get("processed_at").map_err(query_failed)?,
        finished_at: row.try_get("finished_at").map_err(query_failed)?,
    })
}

#[async_trait]
impl JobRepository for PgJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.id.as_uuid()))]
    async fn create(&self, job: &TranscriptionJob) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO transcription_jobs \
             (id, video_id, audio_path, source_lang, target_lang, priority, state, \
              attempts_made, max_attempts, progress, failed_reason, run_at, heartbeat_at, \
              created_at, processed_at, finished_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(job.id.as_uuid())
        .bind(job.video_id.as_i64())
        .bind(&job.audio_path)
        .bind(job.source_lang.as_str())
        .bind(job.target_lang.as_str())
        .bind(job.priority)
        .bind(job.state.as_str())
        .bind(job.attempts_made as i32)
        .bind(job.max_attempts as i32)
        .bind(job.progress as i32)
        .bind(&job.failed_reason)
        .bind(job.run_at)
        .bind(job.heartbeat_at)
        .bind(job.created_at)
        .bind(job.processed_at)
        .bind(job.finished_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id.as_uuid()))]
    async fn get_by_id(&self, id: JobId) -> Result<Option<TranscriptionJob>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM transcription_jobs WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(map_job).transpose()
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn latest_for_video(
        &self,
        video_id: VideoId,
    ) -> Result<Option<TranscriptionJob>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM transcription_jobs \
             WHERE video_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(video_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(map_job).transpose()
    }

    #[instrument(skip(self))]
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TranscriptionJob>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM transcription_jobs \
             WHERE state IN ('WAITING', 'DELAYED') AND run_at <= $1 \
             ORDER BY priority DESC, created_at ASC LIMIT $2"
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(map_job).collect()
    }

    #[instrument(skip(self), fields(job_id = %id.as_uuid()))]
    async fn mark_active(&self, id: JobId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transcription_jobs \
             SET state = 'ACTIVE', attempts_made = attempts_made + 1, \
                 processed_at = COALESCE(processed_at, $2), heartbeat_at = $2 \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    async fn heartbeat(&self, id: JobId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE transcription_jobs SET heartbeat_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }

    async fn update_progress(&self, id: JobId, progress: u8) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE transcription_jobs SET progress = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(progress as i32)
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id.as_uuid()))]
    async fn complete(&self, id: JobId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE transcription_jobs \
             SET state = 'COMPLETED', progress = 100, finished_at = $2 \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self, reason), fields(job_id = %id.as_uuid()))]
    async fn record_failure(
        &self,
        id: JobId,
        reason: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        match retry_at {
            Some(run_at) => {
                sqlx::query(
                    "UPDATE transcription_jobs \
                     SET state = 'DELAYED', failed_reason = $2, run_at = $3, heartbeat_at = NULL \
                     WHERE id = $1",
                )
                .bind(id.as_uuid())
                .bind(reason)
                .bind(run_at)
                .execute(&self.pool)
                .await
                .map_err(query_failed)?;
            }
            None => {
                sqlx::query(
                    "UPDATE transcription_jobs \
                     SET state = 'FAILED', failed_reason = $2, finished_at = $3, \
                         heartbeat_at = NULL \
                     WHERE id = $1",
                )
                .bind(id.as_uuid())
                .bind(reason)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(query_failed)?;
            }
        }
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, RepositoryError> {
        let rows = sqlx::query(
            "SELECT state, COUNT(*) AS total FROM transcription_jobs GROUP BY state",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        let mut counts = QueueCounts::default();
        for row in &rows {
            let state: String = row.try_get("state").map_err(query_failed)?;
            let total: i64 = row.try_get("total").map_err(query_failed)?;
            match state.parse::<JobState>().map_err(RepositoryError::QueryFailed)? {
                JobState::Waiting => counts.waiting = total as u64,
                JobState::Delayed => counts.delayed = total as u64,
                JobState::Active => counts.active = total as u64,
                JobState::Completed => counts.completed = total as u64,
                JobState::Failed => counts.failed = total as u64,
            }
        }
        Ok(counts)
    }

    #[instrument(skip(self), fields(state = %state))]
    async fn list_by_state(
        &self,
        state: JobState,
    ) -> Result<Vec<TranscriptionJob>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM transcription_jobs \
             WHERE state = $1 ORDER BY created_at DESC"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(map_job).collect()
    }

    async fn retry_failed(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE transcription_jobs \
             SET state = 'WAITING', attempts_made = 0, run_at = $1, finished_at = NULL \
             WHERE state = 'FAILED'",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(result.rows_affected())
    }

    async fn prune_finished(
        &self,
        finished_before: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM transcription_jobs \
             WHERE state IN ('COMPLETED', 'FAILED') AND finished_at < $1",
        )
        .bind(finished_before)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(result.rows_affected())
    }

    async fn find_stalled(
        &self,
        heartbeat_before: DateTime<Utc>,
    ) -> Result<Vec<TranscriptionJob>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM transcription_jobs \
             WHERE state = 'ACTIVE' AND heartbeat_at < $1"
        ))
        .bind(heartbeat_before)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(map_job).collect()
    }
}
