use serde_json::Value;
use uuid::Uuid;

use super::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordEntryId(Uuid);

impl WordEntryId {
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

impl Default for WordEntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// A language-learning record for one distinct word. Lookup during import
/// is by literal word text; repeated imports create new rows.
#[derive(Debug, Clone, PartialEq)]
pub struct WordEntry {
    pub id: WordEntryId,
    pub word: String,
    pub language: Language,
    pub translations: Vec<String>,
    pub examples: Vec<String>,
    pub level: String,
    pub metadata: Value,
}

impl WordEntry {
    pub fn new(
        word: String,
        language: Language,
        translations: Vec<String>,
        examples: Vec<String>,
        level: String,
        metadata: Value,
    ) -> Self {
        Self {
            id: WordEntryId::new(),
            word,
            language,
            translations,
            examples,
            level,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PronunciationId(Uuid);

impl PronunciationId {
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

impl Default for PronunciationId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pronunciation {
    pub id: PronunciationId,
    pub word_entry_id: WordEntryId,
    pub file_path: String,
    pub kind: String,
    pub language: Language,
}

impl Pronunciation {
    pub fn new(
        word_entry_id: WordEntryId,
        file_path: String,
        kind: String,
        language: Language,
    ) -> Self {
        Self {
            id: PronunciationId::new(),
            word_entry_id,
            file_path,
            kind,
            language,
        }
    }
}
