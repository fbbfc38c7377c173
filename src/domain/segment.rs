use uuid::Uuid;

use super::{timing, Language, VideoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentId(Uuid);

impl SegmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordSegmentId(Uuid);

impl WordSegmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WordSegmentId {
    fn default() -> Self {
        Self::new()
    }
}

/// A time-bounded transcript span of spoken text within a video.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub id: SegmentId,
    pub video_id: VideoId,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    pub translation: Option<String>,
    pub language: Language,
}

impl AudioSegment {
    pub fn new(
        video_id: VideoId,
        start_ms: i64,
        end_ms: i64,
        text: String,
        translation: Option<String>,
        language: Language,
    ) -> Result<Self, SegmentError> {
        if start_ms >= end_ms {
            return Err(SegmentError::InvalidSpan { start_ms, end_ms });
        }
        Ok(Self {
            id: SegmentId::new(),
            video_id,
            start_ms,
            end_ms,
            text,
            translation,
            language,
        })
    }
}

/// A time-bounded single-word unit nested within a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct WordSegment {
    pub id: WordSegmentId,
    pub audio_segment_id: SegmentId,
    pub word: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub confidence_milli: i64,
    pub position_in_segment: i32,
}

impl WordSegment {
    pub fn new(
        parent: &AudioSegment,
        word: String,
        start_ms: i64,
        end_ms: i64,
        confidence_milli: i64,
        position_in_segment: i32,
    ) -> Result<Self, SegmentError> {
        if start_ms >= end_ms {
            return Err(SegmentError::InvalidSpan { start_ms, end_ms });
        }
        if !timing::contained_in(start_ms, end_ms, parent.start_ms, parent.end_ms) {
            return Err(SegmentError::OutsideParent {
                word: word.clone(),
                start_ms,
                end_ms,
                parent_start_ms: parent.start_ms,
                parent_end_ms: parent.end_ms,
            });
        }
        Ok(Self {
            id: WordSegmentId::new(),
            audio_segment_id: parent.id,
            word,
            start_ms,
            end_ms,
            confidence_milli,
            position_in_segment,
        })
    }
}

/// Rejects a candidate interval that overlaps any of its siblings.
/// Shared by the Postgres and in-memory adapters so both enforce the same
/// half-open convention.
pub fn ensure_no_overlap<I>(start_ms: i64, end_ms: i64, siblings: I) -> Result<(), SegmentError>
where
    I: IntoIterator<Item = (i64, i64)>,
{
    for (other_start, other_end) in siblings {
        if timing::overlaps(start_ms, end_ms, other_start, other_end) {
            return Err(SegmentError::Overlap {
                start_ms,
                end_ms,
                other_start_ms: other_start,
                other_end_ms: other_end,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentError {
    #[error("invalid span: start {start_ms}ms must be before end {end_ms}ms")]
    InvalidSpan { start_ms: i64, end_ms: i64 },
    #[error(
        "span [{start_ms}ms, {end_ms}ms) overlaps existing [{other_start_ms}ms, {other_end_ms}ms)"
    )]
    Overlap {
        start_ms: i64,
        end_ms: i64,
        other_start_ms: i64,
        other_end_ms: i64,
    },
    #[error(
        "word '{word}' [{start_ms}ms, {end_ms}ms) lies outside parent segment [{parent_start_ms}ms, {parent_end_ms}ms)"
    )]
    OutsideParent {
        word: String,
        start_ms: i64,
        end_ms: i64,
        parent_start_ms: i64,
        parent_end_ms: i64,
    },
}
