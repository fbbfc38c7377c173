use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::application::ports::{MediaStore, MediaStoreError};
use crate::domain::StoragePath;

/// Canonical subdirectory audio files live in.
const AUDIOS_DIR: &str = "audios";
/// Transient staging subdirectory uploads land in.
const UPLOADS_DIR: &str = "uploads";

const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "mp4", "m4a", "ogg", "flac", "webm"];

#[derive(Debug, Clone)]
pub struct ValidatedAudio {
    /// Path relative to the storage root, inside `audios/`.
    pub relative: StoragePath,
    /// Absolute path handed to the engine invoker.
    pub absolute: PathBuf,
    pub size_bytes: u64,
}

/// Normalizes an incoming audio path against the storage root, relocates
/// files still sitting in the `uploads/` staging folder and confirms the
/// final location is a readable file inside `audios/`.
pub struct AudioValidator {
    store: Arc<dyn MediaStore>,
    base_dir: PathBuf,
}

impl AudioValidator {
    pub fn new(store: Arc<dyn MediaStore>, base_dir: PathBuf) -> Self {
        Self { store, base_dir }
    }

    pub async fn validate(&self, raw: &str) -> Result<ValidatedAudio, AudioValidationError> {
        let mut relative = self.normalize(raw)?;

        if relative.starts_with(UPLOADS_DIR) {
            let target = StoragePath::join(AUDIOS_DIR, relative.filename());
            self.store
                .rename(&relative, &target)
                .await
                .map_err(|e| match e {
                    MediaStoreError::NotFound(_) => AudioValidationError::FileNotFound(raw.into()),
                    other => AudioValidationError::Store(other),
                })?;
            tracing::info!(from = %relative, to = %target, "Relocated staged upload");
            relative = target;
        }

        if !relative.starts_with(AUDIOS_DIR) {
            return Err(AudioValidationError::InvalidLocation(raw.into()));
        }

        let size_bytes = self.store.head(&relative).await.map_err(|e| match e {
            MediaStoreError::NotFound(_) => AudioValidationError::FileNotFound(raw.into()),
            other => AudioValidationError::Store(other),
        })?;

        match relative.extension() {
            Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => {}
            other => {
                tracing::warn!(
                    path = %relative,
                    extension = other.as_deref().unwrap_or("<none>"),
                    "Unrecognized audio extension, attempting to process anyway"
                );
            }
        }

        Ok(ValidatedAudio {
            absolute: self.base_dir.join(relative.as_str()),
            relative,
            size_bytes,
        })
    }

    /// Strips the storage root from absolute inputs and rejects anything
    /// that would resolve outside it. A bare filename is assumed to mean
    /// the canonical audios directory.
    fn normalize(&self, raw: &str) -> Result<StoragePath, AudioValidationError> {
        let path = Path::new(raw);
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.base_dir)
                .map_err(|_| AudioValidationError::InvalidLocation(raw.into()))?
        } else {
            path
        };

        let mut parts: Vec<&str> = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| AudioValidationError::InvalidLocation(raw.into()))?;
                    parts.push(part);
                }
                Component::CurDir => {}
                // `..`, a root or a prefix would escape the storage root.
                _ => return Err(AudioValidationError::InvalidLocation(raw.into())),
            }
        }

        match parts.as_slice() {
            [] => Err(AudioValidationError::InvalidLocation(raw.into())),
            [filename] => Ok(StoragePath::join(AUDIOS_DIR, filename)),
            _ => Ok(StoragePath::from_raw(parts.join("/"))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AudioValidationError {
    #[error("audio file not found: {0}")]
    FileNotFound(String),
    #[error("audio path resolves outside the storage root: {0}")]
    InvalidLocation(String),
    #[error("storage: {0}")]
    Store(#[from] MediaStoreError),
}
