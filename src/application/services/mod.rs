mod audio_validator;
mod import_service;
mod pipeline_worker;
mod transcription_queue;

pub use audio_validator::{AudioValidationError, AudioValidator, ValidatedAudio};
pub use import_service::{ImportError, ImportSummary, TranscriptionImporter};
pub use pipeline_worker::{JobProcessor, PipelineError, PipelineWorker};
pub use transcription_queue::{
    EnqueueError, QueueConfig, QueueEvent, QueueStatus, TranscriptionQueue, DEFAULT_SOURCE_LANG,
    DEFAULT_TARGET_LANG,
};
