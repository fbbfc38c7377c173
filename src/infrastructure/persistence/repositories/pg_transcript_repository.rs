use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{
    RepositoryError, SegmentImport, TranscriptRepository, VocabularyImport,
};
use crate::domain::{
    AudioSegment, Language, SegmentId, VideoId, WordSegment, WordSegmentId,
};

/// Writes the imported transcript model. Each `import_*` call is one
/// transaction; a failure rolls the whole unit back.
pub struct PgTranscriptRepository {
    pool: PgPool,
}

impl PgTranscriptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::QueryFailed(e.to_string())
}

fn map_segment(row: &PgRow) -> Result<AudioSegment, RepositoryError> {
    let language: String = row.try_get("language").map_err(query_failed)?;
    Ok(AudioSegment {
        id: SegmentId::from_uuid(row.try_get::<Uuid, _>("id").map_err(query_failed)?),
        video_id: VideoId::from_i64(row.try_get("video_id").map_err(query_failed)?),
        start_ms: row.try_get("start_ms").map_err(query_failed)?,
        end_ms: row.try_get("end_ms").map_err(query_failed)?,
        text: row.try_get("text").map_err(query_failed)?,
        translation: row.try_get("translation").map_err(query_failed)?,
        language: Language::from_str(&language).map_err(query_failed)?,
    })
}

fn map_word(row: &PgRow) -> Result<WordSegment, RepositoryError> {
    Ok(WordSegment {
        id: WordSegmentId::from_uuid(row.try_get::<Uuid, _>("id").map_err(query_failed)?),
        audio_segment_id: SegmentId::from_uuid(
            row.try_get::<Uuid, _>("audio_segment_id").map_err(query_failed)?,
        ),
        word: row.try_get("word").map_err(query_failed)?,
        start_ms: row.try_get("start_ms").map_err(query_failed)?,
        end_ms: row.try_get("end_ms").map_err(query_failed)?,
        confidence_milli: row.try_get("confidence_milli").map_err(query_failed)?,
        position_in_segment: row.try_get("position_in_segment").map_err(query_failed)?,
    })
}

/// Rejects the segment if any stored interval of the video overlaps it
/// under half-open semantics. Runs inside the caller's transaction so rows
/// written earlier in the same unit are seen too.
async fn check_segment_overlap(
    conn: &mut PgConnection,
    segment: &AudioSegment,
) -> Result<(), RepositoryError> {
    let conflict = sqlx::query(
        "SELECT start_ms, end_ms FROM audio_segments \
         WHERE video_id = $1 AND start_ms < $3 AND end_ms > $2 LIMIT 1",
    )
    .bind(segment.video_id.as_i64())
    .bind(segment.start_ms)
    .bind(segment.end_ms)
    .fetch_optional(&mut *conn)
    .await
    .map_err(query_failed)?;

    if let Some(row) = conflict {
        let other_start: i64 = row.try_get("start_ms").map_err(query_failed)?;
        let other_end: i64 = row.try_get("end_ms").map_err(query_failed)?;
        return Err(RepositoryError::ConstraintViolation(format!(
            "segment [{}ms, {}ms) overlaps existing [{}ms, {}ms) for video {}",
            segment.start_ms, segment.end_ms, other_start, other_end, segment.video_id
        )));
    }
    Ok(())
}

async fn insert_segment_row(
    conn: &mut PgConnection,
    segment: &AudioSegment,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO audio_segments (id, video_id, start_ms, end_ms, text, translation, language) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(segment.id.as_uuid())
    .bind(segment.video_id.as_i64())
    .bind(segment.start_ms)
    .bind(segment.end_ms)
    .bind(&segment.text)
    .bind(&segment.translation)
    .bind(segment.language.as_str())
    .execute(conn)
    .await
    .map_err(query_failed)?;
    Ok(())
}

async fn insert_word_row(
    conn: &mut PgConnection,
    word: &WordSegment,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO word_segments \
         (id, audio_segment_id, word, start_ms, end_ms, confidence_milli, position_in_segment) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(word.id.as_uuid())
    .bind(word.audio_segment_id.as_uuid())
    .bind(&word.word)
    .bind(word.start_ms)
    .bind(word.end_ms)
    .bind(word.confidence_milli)
    .bind(word.position_in_segment)
    .execute(conn)
    .await
    .map_err(query_failed)?;
    Ok(())
}

async fn insert_vocabulary_unit(
    conn: &mut PgConnection,
    import: &VocabularyImport,
) -> Result<(), RepositoryError> {
    let entry = &import.entry;
    sqlx::query(
        "INSERT INTO word_entries (id, word, language, translations, examples, level, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id.as_uuid())
    .bind(&entry.word)
    .bind(entry.language.as_str())
    .bind(&entry.translations)
    .bind(&entry.examples)
    .bind(&entry.level)
    .bind(&entry.metadata)
    .execute(&mut *conn)
    .await
    .map_err(query_failed)?;

    if let Some(exercise_import) = &import.exercise {
        let exercise = &exercise_import.exercise;
        sqlx::query(
            "INSERT INTO exercises (id, word_entry_id, video_id, kind, level, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(exercise.id.as_uuid())
        .bind(exercise.word_entry_id.as_uuid())
        .bind(exercise.video_id.as_i64())
        .bind(&exercise.kind)
        .bind(&exercise.level)
        .bind(&exercise.metadata)
        .execute(&mut *conn)
        .await
        .map_err(query_failed)?;

        for question_import in &exercise_import.questions {
            let question = &question_import.question;
            sqlx::query(
                "INSERT INTO exercise_questions (id, exercise_id, direction, prompt, correct_answer) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(question.id.as_uuid())
            .bind(question.exercise_id.as_uuid())
            .bind(question.direction.as_str())
            .bind(&question.prompt)
            .bind(&question.correct_answer)
            .execute(&mut *conn)
            .await
            .map_err(query_failed)?;

            for option in &question_import.options {
                sqlx::query(
                    "INSERT INTO exercise_options (id, question_id, text, is_correct) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(option.id.as_uuid())
                .bind(option.question_id.as_uuid())
                .bind(&option.text)
                .bind(option.is_correct)
                .execute(&mut *conn)
                .await
                .map_err(query_failed)?;
            }
        }
    }

    for pronunciation in &import.pronunciations {
        sqlx::query(
            "INSERT INTO pronunciations (id, word_entry_id, file_path, kind, language) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(pronunciation.id.as_uuid())
        .bind(pronunciation.word_entry_id.as_uuid())
        .bind(&pronunciation.file_path)
        .bind(&pronunciation.kind)
        .bind(pronunciation.language.as_str())
        .execute(&mut *conn)
        .await
        .map_err(query_failed)?;
    }

    Ok(())
}

#[async_trait]
impl TranscriptRepository for PgTranscriptRepository {
    #[instrument(skip(self, segments), fields(segments = segments.len()))]
    async fn import_segments(&self, segments: &[SegmentImport]) -> Result<u32, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        for import in segments {
            check_segment_overlap(&mut tx, &import.segment).await?;
            insert_segment_row(&mut tx, &import.segment).await?;
            for word in &import.words {
                insert_word_row(&mut tx, word).await?;
            }
        }

        tx.commit().await.map_err(query_failed)?;
        Ok(segments.len() as u32)
    }

    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    async fn import_vocabulary(
        &self,
        entries: &[VocabularyImport],
    ) -> Result<u32, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        for import in entries {
            insert_vocabulary_unit(&mut tx, import).await?;
        }

        tx.commit().await.map_err(query_failed)?;
        Ok(entries.len() as u32)
    }

    #[instrument(skip(self, segment, words), fields(video_id = %segment.video_id))]
    async fn insert_segment(
        &self,
        segment: &AudioSegment,
        words: &[WordSegment],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        check_segment_overlap(&mut tx, segment).await?;
        insert_segment_row(&mut tx, segment).await?;
        for word in words {
            insert_word_row(&mut tx, word).await?;
        }

        tx.commit().await.map_err(query_failed)?;
        Ok(())
    }

    #[instrument(skip(self, word), fields(segment_id = %segment_id.as_uuid()))]
    async fn append_word(
        &self,
        segment_id: SegmentId,
        word: &str,
        start_ms: i64,
        end_ms: i64,
        confidence_milli: i64,
    ) -> Result<WordSegment, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        let parent_row = sqlx::query(
            "SELECT id, video_id, start_ms, end_ms, text, translation, language \
             FROM audio_segments WHERE id = $1",
        )
        .bind(segment_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_failed)?
        .ok_or_else(|| {
            RepositoryError::NotFound(format!("segment {}", segment_id.as_uuid()))
        })?;
        let parent = map_segment(&parent_row)?;

        let sibling_conflict = sqlx::query(
            "SELECT 1 AS hit FROM word_segments \
             WHERE audio_segment_id = $1 AND start_ms < $3 AND end_ms > $2 LIMIT 1",
        )
        .bind(segment_id.as_uuid())
        .bind(start_ms)
        .bind(end_ms)
        .fetch_optional(&mut *tx)
        .await
        .map_err(query_failed)?;
        if sibling_conflict.is_some() {
            return Err(RepositoryError::ConstraintViolation(format!(
                "word span [{}ms, {}ms) overlaps a sibling in segment {}",
                start_ms,
                end_ms,
                segment_id.as_uuid()
            )));
        }

        let next_position: i32 = sqlx::query(
            "SELECT COALESCE(MAX(position_in_segment), 0) + 1 AS next \
             FROM word_segments WHERE audio_segment_id = $1",
        )
        .bind(segment_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(query_failed)?
        .try_get("next")
        .map_err(query_failed)?;

        let appended = WordSegment::new(
            &parent,
            word.to_string(),
            start_ms,
            end_ms,
            confidence_milli,
            next_position,
        )
        .map_err(|e| RepositoryError::ConstraintViolation(e.to_string()))?;

        insert_word_row(&mut tx, &appended).await?;
        tx.commit().await.map_err(query_failed)?;
        Ok(appended)
    }

    #[instrument(skip(self), fields(video_id = %video_id))]
    async fn segments_for_video(
        &self,
        video_id: VideoId,
    ) -> Result<Vec<AudioSegment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, video_id, start_ms, end_ms, text, translation, language \
             FROM audio_segments WHERE video_id = $1 ORDER BY start_ms ASC",
        )
        .bind(video_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(map_segment).collect()
    }

    #[instrument(skip(self), fields(segment_id = %segment_id.as_uuid()))]
    async fn words_for_segment(
        &self,
        segment_id: SegmentId,
    ) -> Result<Vec<WordSegment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, audio_segment_id, word, start_ms, end_ms, confidence_milli, \
                    position_in_segment \
             FROM word_segments WHERE audio_segment_id = $1 ORDER BY position_in_segment ASC",
        )
        .bind(segment_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        rows.iter().map(map_word).collect()
    }
}
