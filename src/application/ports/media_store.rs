use std::io;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::domain::StoragePath;

/// Byte storage under the media root. The upload collaborator writes
/// through `store`; the pipeline uses `head`/`rename`/`delete` to validate
/// and relocate audio files.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    async fn store(
        &self,
        path: &StoragePath,
        stream: BoxStream<'_, Result<Bytes, io::Error>>,
        content_length: Option<u64>,
    ) -> Result<u64, MediaStoreError>;

    async fn fetch(&self, path: &StoragePath) -> Result<Vec<u8>, MediaStoreError>;

    async fn delete(&self, path: &StoragePath) -> Result<(), MediaStoreError>;

    /// Size of the object, or `NotFound`.
    async fn head(&self, path: &StoragePath) -> Result<u64, MediaStoreError>;

    async fn rename(&self, from: &StoragePath, to: &StoragePath) -> Result<(), MediaStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MediaStoreError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("rename failed: {0}")]
    RenameFailed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
