use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::application::ports::{
    ExerciseImport, QuestionImport, RepositoryError, SegmentImport, TranscriptRepository,
    VideoRepository, VocabularyImport,
};
use crate::domain::{
    ensure_no_overlap, timing, AudioSegment, Direction, DirectionalQuestion, Exercise, ExerciseId,
    ExerciseOption, ExercisePayload, ExerciseQuestion, Language, OptionId, ProcessingLogEntry,
    ProcessingStep, Pronunciation, QuestionId, SegmentError, StepStatus, VideoId, WordEntry,
    WordSegment,
};

const EXERCISE_KIND_PAIR: &str = "multiple_choice_pair";
const DEFAULT_LEVEL: &str = "beginner";

/// What the importer reports back to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub segments: u32,
    pub vocabulary: u32,
    pub language: Language,
}

/// Parses the engine's structured output and persists the transcript model:
/// segments in one transaction, the whole vocabulary loop (entries,
/// exercises, pronunciations) in another. Stage boundaries are appended to
/// the processing log as they are crossed.
pub struct TranscriptionImporter {
    transcripts: Arc<dyn TranscriptRepository>,
    ledger: Arc<dyn VideoRepository>,
}

impl TranscriptionImporter {
    pub fn new(transcripts: Arc<dyn TranscriptRepository>, ledger: Arc<dyn VideoRepository>) -> Self {
        Self { transcripts, ledger }
    }

    pub async fn load(
        &self,
        video_id: VideoId,
        output_path: &Path,
    ) -> Result<ImportSummary, ImportError> {
        self.log(video_id, ProcessingStep::DatabaseImport, StepStatus::Started, None)
            .await?;

        let result = self.run_import(video_id, output_path).await;

        match &result {
            Ok(outcome) => {
                self.log(
                    video_id,
                    ProcessingStep::DatabaseImport,
                    StepStatus::Completed,
                    Some(format!(
                        "imported {} segments, {} vocabulary entries",
                        outcome.summary.segments, outcome.summary.vocabulary
                    )),
                )
                .await?;
                self.log(video_id, ProcessingStep::Exercises, StepStatus::Started, None)
                    .await?;
                self.log(
                    video_id,
                    ProcessingStep::Exercises,
                    StepStatus::Completed,
                    Some(format!("generated {} exercises", outcome.exercises)),
                )
                .await?;
                self.log(video_id, ProcessingStep::Pronunciations, StepStatus::Started, None)
                    .await?;
                self.log(
                    video_id,
                    ProcessingStep::Pronunciations,
                    StepStatus::Completed,
                    Some(format!("stored {} pronunciations", outcome.pronunciations)),
                )
                .await?;
            }
            Err(e) => {
                self.log(
                    video_id,
                    ProcessingStep::DatabaseImport,
                    StepStatus::Failed,
                    Some(e.to_string()),
                )
                .await?;
            }
        }

        result.map(|outcome| outcome.summary)
    }

    async fn run_import(
        &self,
        video_id: VideoId,
        output_path: &Path,
    ) -> Result<ImportOutcome, ImportError> {
        let raw = tokio::fs::read(output_path).await?;
        let document: EngineDocument = serde_json::from_slice(&raw)
            .map_err(|e| ImportError::MalformedOutput(e.to_string()))?;

        let language = match document.language.as_deref() {
            None => Language::German,
            Some(tag) => Language::from_str(tag)
                .map_err(|e| ImportError::MalformedOutput(e.to_string()))?,
        };

        let segments = build_segments(video_id, language, &document.segments)?;
        let vocabulary = build_vocabulary(video_id, language, &document.vocabulary)?;

        let exercises = vocabulary.iter().filter(|v| v.exercise.is_some()).count() as u32;
        let pronunciations = vocabulary
            .iter()
            .map(|v| v.pronunciations.len() as u32)
            .sum();

        let segment_count = self.transcripts.import_segments(&segments).await?;
        let vocabulary_count = self.transcripts.import_vocabulary(&vocabulary).await?;

        tracing::info!(
            video_id = %video_id,
            segments = segment_count,
            vocabulary = vocabulary_count,
            exercises,
            pronunciations,
            language = %language,
            "Transcript import finished"
        );

        Ok(ImportOutcome {
            summary: ImportSummary {
                segments: segment_count,
                vocabulary: vocabulary_count,
                language,
            },
            exercises,
            pronunciations,
        })
    }

    async fn log(
        &self,
        video_id: VideoId,
        step: ProcessingStep,
        status: StepStatus,
        message: Option<String>,
    ) -> Result<(), RepositoryError> {
        self.ledger
            .append_log(&ProcessingLogEntry::new(video_id, step, status, message))
            .await
    }
}

struct ImportOutcome {
    summary: ImportSummary,
    exercises: u32,
    pronunciations: u32,
}

fn build_segments(
    video_id: VideoId,
    language: Language,
    raw_segments: &[EngineSegment],
) -> Result<Vec<SegmentImport>, ImportError> {
    let mut imports = Vec::with_capacity(raw_segments.len());
    let mut claimed: Vec<(i64, i64)> = Vec::with_capacity(raw_segments.len());

    for raw in raw_segments {
        let start_ms = timing::seconds_to_millis(raw.start);
        let end_ms = timing::seconds_to_millis(raw.end);
        let segment = AudioSegment::new(
            video_id,
            start_ms,
            end_ms,
            raw.text.clone(),
            raw.translation.clone(),
            language,
        )?;
        ensure_no_overlap(start_ms, end_ms, claimed.iter().copied())?;
        claimed.push((start_ms, end_ms));

        let mut words = Vec::with_capacity(raw.words.len());
        let mut word_spans: Vec<(i64, i64)> = Vec::with_capacity(raw.words.len());
        for (index, raw_word) in raw.words.iter().enumerate() {
            let word_start = timing::seconds_to_millis(raw_word.start);
            let word_end = timing::seconds_to_millis(raw_word.end);
            let word = WordSegment::new(
                &segment,
                raw_word.word.clone(),
                word_start,
                word_end,
                timing::confidence_to_milli(raw_word.score),
                (index + 1) as i32,
            )?;
            ensure_no_overlap(word_start, word_end, word_spans.iter().copied())?;
            word_spans.push((word_start, word_end));
            words.push(word);
        }

        imports.push(SegmentImport { segment, words });
    }

    Ok(imports)
}

fn build_vocabulary(
    video_id: VideoId,
    language: Language,
    raw_entries: &[EngineVocabulary],
) -> Result<Vec<VocabularyImport>, ImportError> {
    let mut imports = Vec::with_capacity(raw_entries.len());

    for raw in raw_entries {
        let entry = WordEntry::new(
            raw.word.clone(),
            language,
            raw.translations.clone(),
            raw.examples.clone(),
            raw.level.clone().unwrap_or_else(|| DEFAULT_LEVEL.to_string()),
            raw.metadata.clone().unwrap_or(Value::Null),
        );

        let exercise = match &raw.exercises {
            Some(payload) => Some(build_exercise(video_id, &entry, payload)?),
            None => None,
        };

        let mut pronunciations = Vec::new();
        if let Some(raw_pronunciations) = &raw.pronunciations {
            for raw_pron in raw_pronunciations {
                if raw_pron.file_path.trim().is_empty() {
                    return Err(ImportError::MalformedOutput(format!(
                        "pronunciation for '{}' has an empty file path",
                        raw.word
                    )));
                }
                let pron_language = match raw_pron.language.as_deref() {
                    None => language,
                    Some(tag) => Language::from_str(tag)
                        .map_err(|e| ImportError::MalformedOutput(e.to_string()))?,
                };
                pronunciations.push(Pronunciation::new(
                    entry.id,
                    raw_pron.file_path.clone(),
                    raw_pron.kind.clone(),
                    pron_language,
                ));
            }
        }

        imports.push(VocabularyImport {
            entry,
            exercise,
            pronunciations,
        });
    }

    Ok(imports)
}

/// Validates the exercise payload against its declared `type` and
/// decomposes `multiple_choice_pair` into directional questions. Any other
/// kind is retained opaquely.
fn build_exercise(
    video_id: VideoId,
    entry: &WordEntry,
    payload: &Value,
) -> Result<ExerciseImport, ImportError> {
    let parsed = parse_exercise_payload(entry, payload)?;

    match parsed {
        ExercisePayload::MultipleChoicePair { level, questions } => {
            let exercise = Exercise {
                id: ExerciseId::new(),
                word_entry_id: entry.id,
                video_id,
                kind: EXERCISE_KIND_PAIR.to_string(),
                level,
                metadata: payload.clone(),
            };
            let questions = questions
                .into_iter()
                .map(|q| decompose_question(exercise.id, q))
                .collect();
            Ok(ExerciseImport { exercise, questions })
        }
        ExercisePayload::Opaque { kind, level, metadata } => Ok(ExerciseImport {
            exercise: Exercise {
                id: ExerciseId::new(),
                word_entry_id: entry.id,
                video_id,
                kind,
                level,
                metadata,
            },
            questions: Vec::new(),
        }),
    }
}

fn parse_exercise_payload(
    entry: &WordEntry,
    payload: &Value,
) -> Result<ExercisePayload, ImportError> {
    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ImportError::MalformedOutput(format!(
                "exercise payload for '{}' is missing a type discriminator",
                entry.word
            ))
        })?
        .to_string();

    if kind != EXERCISE_KIND_PAIR {
        let level = payload
            .get("level")
            .and_then(Value::as_str)
            .unwrap_or(entry.level.as_str())
            .to_string();
        return Ok(ExercisePayload::Opaque {
            kind,
            level,
            metadata: payload.clone(),
        });
    }

    let raw: RawPairExercise = serde_json::from_value(payload.clone()).map_err(|e| {
        ImportError::MalformedOutput(format!(
            "multiple_choice_pair payload for '{}': {}",
            entry.word, e
        ))
    })?;

    let mut questions = Vec::new();
    if let Some(question) = raw.de_to_fr {
        questions.push(validate_question(entry, Direction::DeToFr, question)?);
    }
    if let Some(question) = raw.fr_to_de {
        questions.push(validate_question(entry, Direction::FrToDe, question)?);
    }
    if questions.is_empty() {
        return Err(ImportError::MalformedOutput(format!(
            "multiple_choice_pair payload for '{}' declares no direction",
            entry.word
        )));
    }

    Ok(ExercisePayload::MultipleChoicePair {
        level: raw.level.unwrap_or_else(|| entry.level.clone()),
        questions,
    })
}

fn validate_question(
    entry: &WordEntry,
    direction: Direction,
    raw: RawQuestion,
) -> Result<DirectionalQuestion, ImportError> {
    if raw.options.is_empty() {
        return Err(ImportError::MalformedOutput(format!(
            "{} question for '{}' has no options",
            direction, entry.word
        )));
    }
    if !raw.options.iter().any(|option| *option == raw.correct_answer) {
        return Err(ImportError::MalformedOutput(format!(
            "{} question for '{}': correct answer '{}' is not among the options",
            direction, entry.word, raw.correct_answer
        )));
    }
    Ok(DirectionalQuestion {
        direction,
        prompt: raw.question,
        options: raw.options,
        correct_answer: raw.correct_answer,
    })
}

fn decompose_question(exercise_id: ExerciseId, question: DirectionalQuestion) -> QuestionImport {
    let persisted = ExerciseQuestion {
        id: QuestionId::new(),
        exercise_id,
        direction: question.direction,
        prompt: question.prompt,
        correct_answer: question.correct_answer.clone(),
    };
    let options = question
        .options
        .into_iter()
        .map(|text| ExerciseOption {
            id: OptionId::new(),
            question_id: persisted.id,
            is_correct: text == question.correct_answer,
            text,
        })
        .collect();
    QuestionImport {
        question: persisted,
        options,
    }
}

// Wire shape of the engine's output document.

#[derive(Debug, Deserialize)]
struct EngineDocument {
    language: Option<String>,
    #[serde(default)]
    segments: Vec<EngineSegment>,
    #[serde(default)]
    vocabulary: Vec<EngineVocabulary>,
}

#[derive(Debug, Deserialize)]
struct EngineSegment {
    start: f64,
    end: f64,
    text: String,
    translation: Option<String>,
    #[serde(default)]
    words: Vec<EngineWord>,
}

#[derive(Debug, Deserialize)]
struct EngineWord {
    word: String,
    start: f64,
    end: f64,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct EngineVocabulary {
    word: String,
    #[serde(default)]
    translations: Vec<String>,
    #[serde(default)]
    examples: Vec<String>,
    level: Option<String>,
    metadata: Option<Value>,
    exercises: Option<Value>,
    pronunciations: Option<Vec<EnginePronunciation>>,
}

#[derive(Debug, Deserialize)]
struct EnginePronunciation {
    file_path: String,
    #[serde(rename = "type")]
    kind: String,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPairExercise {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: String,
    level: Option<String>,
    de_to_fr: Option<RawQuestion>,
    fr_to_de: Option<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read engine output: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed engine output: {0}")]
    MalformedOutput(String),
    #[error("segment validation: {0}")]
    Segment(#[from] SegmentError),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
}
