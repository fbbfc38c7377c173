mod job_repository;
mod media_store;
mod repository_error;
mod transcript_repository;
mod transcription_engine;
mod video_repository;

pub use job_repository::{JobRepository, QueueCounts};
pub use media_store::{MediaStore, MediaStoreError};
pub use repository_error::RepositoryError;
pub use transcript_repository::{
    ExerciseImport, QuestionImport, SegmentImport, TranscriptRepository, VocabularyImport,
};
pub use transcription_engine::{EngineError, EngineRequest, EngineRun, TranscriptionEngine};
pub use video_repository::VideoRepository;
