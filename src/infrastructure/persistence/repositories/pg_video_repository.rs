use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{RepositoryError, VideoRepository};
use crate::domain::{
    Language, ProcessingLogEntry, ProcessingStep, StepStatus, TranscriptionStatus, Video, VideoId,
};

pub struct PgVideoRepository {
    pool: PgPool,
}

impl PgVideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn map_video(row: &PgRow) -> Result<Video, RepositoryError> {
    let language: String = row.try_get("language").map_err(query_failed)?;
    let status: String = row.try_get("transcription_status").map_err(query_failed)?;

    Ok(Video {
        id: VideoId::from_i64(row.try_get("id").map_err(query_failed)?),
        original_filename: row.try_get("original_filename").map_err(query_failed)?,
        storage_path: row.try_get("storage_path").map_err(query_failed)?,
        size_bytes: row.try_get::<i64, _>("size_bytes").map_err(query_failed)?.max(0) as u64,
        language: Language::from_str(&language).map_err(query_failed)?,
        transcription_status: status
            .parse::<TranscriptionStatus>()
            .map_err(RepositoryError::QueryFailed)?,
        error_message: row.try_get("error_message").map_err(query_failed)?,
        transcript_path: row.try_get("transcript_path").map_err(query_failed)?,
        created_at: row.try_get("created_at").map_err(query_failed)?,
        updated_at: row.try_get("updated_at").map_err(query_failed)?,
        processed_at: row.try_get("processed_at").map_err(query_failed)?,
    })
}

#[async_trait]
impl VideoRepository for PgVideoRepository {
    #[instrument(skip(self), fields(video_id = %id))]
    async fn get(&self, id: VideoId) -> Result<Option<Video>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, original_filename, storage_path, size_bytes, language, \
                    transcription_status, error_message, transcript_path, created_at, \
                    updated_at, processed_at \
             FROM videos WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;

        row.as_ref().map(map_video).transpose()
    }

    #[instrument(skip(self), fields(video_id = %id))]
    async fn mark_processing(&self, id: VideoId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE videos \
             SET transcription_status = 'PROCESSING', error_message = NULL, updated_at = $2 \
             WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self, transcript_path), fields(video_id = %id))]
    async fn mark_completed(
        &self,
        id: VideoId,
        transcript_path: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE videos \
             SET transcription_status = 'COMPLETED', error_message = NULL, \
                 transcript_path = $2, processed_at = $3, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(transcript_path)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self, error), fields(video_id = %id))]
    async fn mark_failed(&self, id: VideoId, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE videos \
             SET transcription_status = 'FAILED', error_message = $2, updated_at = $3 \
             WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    async fn append_log(&self, entry: &ProcessingLogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO processing_logs (video_id, step, status, message, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.video_id.as_i64())
        .bind(entry.step.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.message)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn list_logs(
        &self,
        video_id: VideoId,
    ) -> Result<Vec<ProcessingLogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT video_id, step, status, message, created_at \
             FROM processing_logs WHERE video_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(video_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter()
            .map(|row| {
                let step: String = row.try_get("step").map_err(query_failed)?;
                let status: String = row.try_get("status").map_err(query_failed)?;
                Ok(ProcessingLogEntry {
                    video_id: VideoId::from_i64(row.try_get("video_id").map_err(query_failed)?),
                    step: step
                        .parse::<ProcessingStep>()
                        .map_err(RepositoryError::QueryFailed)?,
                    status: status
                        .parse::<StepStatus>()
                        .map_err(RepositoryError::QueryFailed)?,
                    message: row.try_get("message").map_err(query_failed)?,
                    created_at: row.try_get("created_at").map_err(query_failed)?,
                })
            })
            .collect()
    }
}
