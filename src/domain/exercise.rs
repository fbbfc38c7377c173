use serde_json::Value;
use uuid::Uuid;

use super::{VideoId, WordEntryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExerciseId(Uuid);

impl ExerciseId {
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

impl Default for ExerciseId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionId(Uuid);

impl QuestionId {
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

impl Default for QuestionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionId(Uuid);

impl OptionId {
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

impl Default for OptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Translation direction of a multiple-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    DeToFr,
    FrToDe,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::DeToFr => "de_to_fr",
            Direction::FrToDe => "fr_to_de",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A practice item generated for a vocabulary word.
#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub id: ExerciseId,
    pub word_entry_id: WordEntryId,
    pub video_id: VideoId,
    pub kind: String,
    pub level: String,
    pub metadata: Value,
}

/// The engine's exercise payload, discriminated by its `type` field. Only
/// `multiple_choice_pair` decomposes into explicit questions and options;
/// every other kind is retained opaquely in the exercise metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum ExercisePayload {
    MultipleChoicePair {
        level: String,
        questions: Vec<DirectionalQuestion>,
    },
    Opaque {
        kind: String,
        level: String,
        metadata: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalQuestion {
    pub direction: Direction,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseQuestion {
    pub id: QuestionId,
    pub exercise_id: ExerciseId,
    pub direction: Direction,
    pub prompt: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseOption {
    pub id: OptionId,
    pub question_id: QuestionId,
    pub text: String,
    pub is_correct: bool,
}
