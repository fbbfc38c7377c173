use async_trait::async_trait;

use crate::domain::{
    AudioSegment, Exercise, ExerciseOption, ExerciseQuestion, Pronunciation, SegmentId, VideoId,
    WordEntry, WordSegment,
};

use super::RepositoryError;

/// One segment with its nested word timings, ready to persist.
#[derive(Debug, Clone)]
pub struct SegmentImport {
    pub segment: AudioSegment,
    pub words: Vec<WordSegment>,
}

/// One decomposed multiple-choice question with its options.
#[derive(Debug, Clone)]
pub struct QuestionImport {
    pub question: ExerciseQuestion,
    pub options: Vec<ExerciseOption>,
}

#[derive(Debug, Clone)]
pub struct ExerciseImport {
    pub exercise: Exercise,
    pub questions: Vec<QuestionImport>,
}

/// One vocabulary entry with everything hanging off it.
#[derive(Debug, Clone)]
pub struct VocabularyImport {
    pub entry: WordEntry,
    pub exercise: Option<ExerciseImport>,
    pub pronunciations: Vec<Pronunciation>,
}

/// Persistence for the imported transcript model. The two `import_*`
/// operations each run as a single transaction; a failure leaves no partial
/// rows reachable. The single-entity operations serve the external segment
/// and word editors and enforce the same interval invariants.
#[async_trait]
pub trait TranscriptRepository: Send + Sync {
    /// Inserts all segments and their words in one transaction, validating
    /// spans, per-video overlap (against the batch and existing rows) and
    /// word containment. Returns the number of segments written.
    async fn import_segments(
        &self,
        segments: &[SegmentImport],
    ) -> Result<u32, RepositoryError>;

    /// Inserts every vocabulary entry, exercise decomposition and
    /// pronunciation in one transaction wrapping the whole loop. Returns
    /// the number of vocabulary entries written.
    async fn import_vocabulary(
        &self,
        entries: &[VocabularyImport],
    ) -> Result<u32, RepositoryError>;

    /// Single-segment insert for editing collaborators; rejects overlap
    /// with the video's existing segments.
    async fn insert_segment(
        &self,
        segment: &AudioSegment,
        words: &[WordSegment],
    ) -> Result<(), RepositoryError>;

    /// Appends a word to a segment, assigning the next dense
    /// `position_in_segment`; rejects spans outside the parent or
    /// overlapping a sibling.
    async fn append_word(
        &self,
        segment_id: SegmentId,
        word: &str,
        start_ms: i64,
        end_ms: i64,
        confidence_milli: i64,
    ) -> Result<WordSegment, RepositoryError>;

    async fn segments_for_video(
        &self,
        video_id: VideoId,
    ) -> Result<Vec<AudioSegment>, RepositoryError>;

    async fn words_for_segment(
        &self,
        segment_id: SegmentId,
    ) -> Result<Vec<WordSegment>, RepositoryError>;
}
