mod exercise;
mod job;
mod language;
mod processing_log;
mod segment;
mod storage_path;
pub mod timing;
mod video;
mod vocabulary;

pub use exercise::{
    Direction, DirectionalQuestion, Exercise, ExerciseId, ExerciseOption, ExercisePayload,
    ExerciseQuestion, OptionId, QuestionId,
};
pub use job::{EnqueueOptions, JobId, JobState, TranscriptionJob};
pub use language::{Language, UnsupportedLanguage};
pub use processing_log::{ProcessingLogEntry, ProcessingStep, StepStatus};
pub use segment::{
    ensure_no_overlap, AudioSegment, SegmentError, SegmentId, WordSegment, WordSegmentId,
};
pub use storage_path::StoragePath;
pub use video::{TranscriptionStatus, Video, VideoId};
pub use vocabulary::{Pronunciation, PronunciationId, WordEntry, WordEntryId};
