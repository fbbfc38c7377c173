use async_trait::async_trait;

use crate::domain::{ProcessingLogEntry, Video, VideoId};

use super::RepositoryError;

/// The video lifecycle ledger. Status transitions and the append-only step
/// log are owned by the pipeline while a video is being processed.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn get(&self, id: VideoId) -> Result<Option<Video>, RepositoryError>;

    async fn mark_processing(&self, id: VideoId) -> Result<(), RepositoryError>;

    /// Terminal success: stamps `processed_at`, clears the error field and
    /// records where the imported transcript file lives.
    async fn mark_completed(&self, id: VideoId, transcript_path: &str)
        -> Result<(), RepositoryError>;

    async fn mark_failed(&self, id: VideoId, error: &str) -> Result<(), RepositoryError>;

    async fn append_log(&self, entry: &ProcessingLogEntry) -> Result<(), RepositoryError>;

    async fn list_logs(&self, video_id: VideoId)
        -> Result<Vec<ProcessingLogEntry>, RepositoryError>;
}
