use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::ports::{
    JobRepository, QueueCounts, RepositoryError, SegmentImport, TranscriptRepository,
    VideoRepository, VocabularyImport,
};
use crate::domain::{
    ensure_no_overlap, timing, AudioSegment, Exercise, ExerciseOption, ExerciseQuestion, JobId,
    JobState, ProcessingLogEntry, Pronunciation, SegmentId, TranscriptionJob, Video, VideoId,
    WordEntry, WordSegment,
};

/// In-memory job store with the same dispatch/retry semantics as the
/// Postgres adapter; backs the queue and pipeline tests.
#[derive(Default)]
pub struct MockJobRepository {
    jobs: Mutex<HashMap<JobId, TranscriptionJob>>,
}

impl MockJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for MockJobRepository {
    async fn create(&self, job: &TranscriptionJob) -> Result<(), RepositoryError> {
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: JobId) -> Result<Option<TranscriptionJob>, RepositoryError> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn latest_for_video(
        &self,
        video_id: VideoId,
    ) -> Result<Option<TranscriptionJob>, RepositoryError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .filter(|job| job.video_id == video_id)
            .max_by_key(|job| job.created_at)
            .cloned())
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TranscriptionJob>, RepositoryError> {
        let jobs = self.jobs.lock().unwrap();
        let mut due: Vec<TranscriptionJob> = jobs
            .values()
            .filter(|job| {
                matches!(job.state, JobState::Waiting | JobState::Delayed) && job.run_at <= now
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_active(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("job {}", id.as_uuid())))?;
        job.state = JobState::Active;
        job.attempts_made += 1;
        let now = Utc::now();
        job.processed_at.get_or_insert(now);
        job.heartbeat_at = Some(now);
        Ok(())
    }

    async fn heartbeat(&self, id: JobId) -> Result<(), RepositoryError> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            job.heartbeat_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_progress(&self, id: JobId, progress: u8) -> Result<(), RepositoryError> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            job.progress = progress;
        }
        Ok(())
    }

    async fn complete(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("job {}", id.as_uuid())))?;
        job.state = JobState::Completed;
        job.progress = 100;
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    async fn record_failure(
        &self,
        id: JobId,
        reason: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("job {}", id.as_uuid())))?;
        job.failed_reason = Some(reason.to_string());
        job.heartbeat_at = None;
        match retry_at {
            Some(run_at) => {
                job.state = JobState::Delayed;
                job.run_at = run_at;
            }
            None => {
                job.state = JobState::Failed;
                job.finished_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, RepositoryError> {
        let jobs = self.jobs.lock().unwrap();
        let mut counts = QueueCounts::default();
        for job in jobs.values() {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Delayed => counts.delayed += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn list_by_state(
        &self,
        state: JobState,
    ) -> Result<Vec<TranscriptionJob>, RepositoryError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.values().filter(|j| j.state == state).cloned().collect())
    }

    async fn retry_failed(&self) -> Result<u64, RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let now = Utc::now();
        let mut requeued = 0;
        for job in jobs.values_mut() {
            if job.state == JobState::Failed {
                job.state = JobState::Waiting;
                job.attempts_made = 0;
                job.run_at = now;
                job.finished_at = None;
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn prune_finished(
        &self,
        finished_before: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.state.is_terminal()
                && job.finished_at.map(|at| at < finished_before).unwrap_or(false))
        });
        Ok((before - jobs.len()) as u64)
    }

    async fn find_stalled(
        &self,
        heartbeat_before: DateTime<Utc>,
    ) -> Result<Vec<TranscriptionJob>, RepositoryError> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .values()
            .filter(|job| {
                job.state == JobState::Active
                    && job.heartbeat_at.map(|at| at < heartbeat_before).unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

/// In-memory video ledger.
#[derive(Default)]
pub struct MockVideoRepository {
    videos: Mutex<HashMap<i64, Video>>,
    logs: Mutex<Vec<ProcessingLogEntry>>,
}

impl MockVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, video: Video) {
        self.videos.lock().unwrap().insert(video.id.as_i64(), video);
    }
}

#[async_trait]
impl VideoRepository for MockVideoRepository {
    async fn get(&self, id: VideoId) -> Result<Option<Video>, RepositoryError> {
        Ok(self.videos.lock().unwrap().get(&id.as_i64()).cloned())
    }

    async fn mark_processing(&self, id: VideoId) -> Result<(), RepositoryError> {
        let mut videos = self.videos.lock().unwrap();
        let video = videos
            .get_mut(&id.as_i64())
            .ok_or_else(|| RepositoryError::NotFound(format!("video {}", id)))?;
        video.transcription_status = crate::domain::TranscriptionStatus::Processing;
        video.error_message = None;
        video.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_completed(
        &self,
        id: VideoId,
        transcript_path: &str,
    ) -> Result<(), RepositoryError> {
        let mut videos = self.videos.lock().unwrap();
        let video = videos
            .get_mut(&id.as_i64())
            .ok_or_else(|| RepositoryError::NotFound(format!("video {}", id)))?;
        video.transcription_status = crate::domain::TranscriptionStatus::Completed;
        video.error_message = None;
        video.transcript_path = Some(transcript_path.to_string());
        let now = Utc::now();
        video.processed_at = Some(now);
        video.updated_at = now;
        Ok(())
    }

    async fn mark_failed(&self, id: VideoId, error: &str) -> Result<(), RepositoryError> {
        let mut videos = self.videos.lock().unwrap();
        let video = videos
            .get_mut(&id.as_i64())
            .ok_or_else(|| RepositoryError::NotFound(format!("video {}", id)))?;
        video.transcription_status = crate::domain::TranscriptionStatus::Failed;
        video.error_message = Some(error.to_string());
        video.updated_at = Utc::now();
        Ok(())
    }

    async fn append_log(&self, entry: &ProcessingLogEntry) -> Result<(), RepositoryError> {
        self.logs.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_logs(
        &self,
        video_id: VideoId,
    ) -> Result<Vec<ProcessingLogEntry>, RepositoryError> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.video_id == video_id)
            .cloned()
            .collect())
    }
}

/// In-memory transcript store enforcing the same interval invariants as
/// the Postgres adapter. Writes are staged and only applied when the whole
/// unit validates, mirroring the transactional behavior.
#[derive(Default)]
pub struct MockTranscriptRepository {
    segments: Mutex<Vec<AudioSegment>>,
    words: Mutex<Vec<WordSegment>>,
    entries: Mutex<Vec<WordEntry>>,
    exercises: Mutex<Vec<Exercise>>,
    questions: Mutex<Vec<ExerciseQuestion>>,
    options: Mutex<Vec<ExerciseOption>>,
    pronunciations: Mutex<Vec<Pronunciation>>,
}

impl MockTranscriptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn word_entries(&self) -> Vec<WordEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn exercises(&self) -> Vec<Exercise> {
        self.exercises.lock().unwrap().clone()
    }

    pub fn questions(&self) -> Vec<ExerciseQuestion> {
        self.questions.lock().unwrap().clone()
    }

    pub fn options(&self) -> Vec<ExerciseOption> {
        self.options.lock().unwrap().clone()
    }

    pub fn pronunciations(&self) -> Vec<Pronunciation> {
        self.pronunciations.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptRepository for MockTranscriptRepository {
    async fn import_segments(&self, imports: &[SegmentImport]) -> Result<u32, RepositoryError> {
        let mut segments = self.segments.lock().unwrap();
        let mut words = self.words.lock().unwrap();

        let mut staged_segments: Vec<AudioSegment> = Vec::with_capacity(imports.len());
        let mut staged_words: Vec<WordSegment> = Vec::new();

        for import in imports {
            let candidate = &import.segment;
            let siblings = segments
                .iter()
                .chain(staged_segments.iter())
                .filter(|s| s.video_id == candidate.video_id)
                .map(|s| (s.start_ms, s.end_ms));
            ensure_no_overlap(candidate.start_ms, candidate.end_ms, siblings)
                .map_err(|e| RepositoryError::ConstraintViolation(e.to_string()))?;
            staged_segments.push(candidate.clone());
            staged_words.extend(import.words.iter().cloned());
        }

        let count = staged_segments.len() as u32;
        segments.extend(staged_segments);
        words.extend(staged_words);
        Ok(count)
    }

    async fn import_vocabulary(
        &self,
        imports: &[VocabularyImport],
    ) -> Result<u32, RepositoryError> {
        let mut entries = self.entries.lock().unwrap();
        let mut exercises = self.exercises.lock().unwrap();
        let mut questions = self.questions.lock().unwrap();
        let mut options = self.options.lock().unwrap();
        let mut pronunciations = self.pronunciations.lock().unwrap();

        for import in imports {
            entries.push(import.entry.clone());
            if let Some(exercise_import) = &import.exercise {
                exercises.push(exercise_import.exercise.clone());
                for question_import in &exercise_import.questions {
                    questions.push(question_import.question.clone());
                    options.extend(question_import.options.iter().cloned());
                }
            }
            pronunciations.extend(import.pronunciations.iter().cloned());
        }

        Ok(imports.len() as u32)
    }

    async fn insert_segment(
        &self,
        segment: &AudioSegment,
        new_words: &[WordSegment],
    ) -> Result<(), RepositoryError> {
        let mut segments = self.segments.lock().unwrap();
        let siblings = segments
            .iter()
            .filter(|s| s.video_id == segment.video_id)
            .map(|s| (s.start_ms, s.end_ms));
        ensure_no_overlap(segment.start_ms, segment.end_ms, siblings)
            .map_err(|e| RepositoryError::ConstraintViolation(e.to_string()))?;
        segments.push(segment.clone());
        self.words.lock().unwrap().extend(new_words.iter().cloned());
        Ok(())
    }

    async fn append_word(
        &self,
        segment_id: SegmentId,
        word: &str,
        start_ms: i64,
        end_ms: i64,
        confidence_milli: i64,
    ) -> Result<WordSegment, RepositoryError> {
        let segments = self.segments.lock().unwrap();
        let parent = segments
            .iter()
            .find(|s| s.id == segment_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("segment {}", segment_id.as_uuid())))?
            .clone();
        drop(segments);

        let mut words = self.words.lock().unwrap();
        let siblings: Vec<(i64, i64)> = words
            .iter()
            .filter(|w| w.audio_segment_id == segment_id)
            .map(|w| (w.start_ms, w.end_ms))
            .collect();
        if siblings
            .iter()
            .any(|&(s, e)| timing::overlaps(start_ms, end_ms, s, e))
        {
            return Err(RepositoryError::ConstraintViolation(format!(
                "word span [{}ms, {}ms) overlaps a sibling in segment {}",
                start_ms,
                end_ms,
                segment_id.as_uuid()
            )));
        }

        let next_position = words
            .iter()
            .filter(|w| w.audio_segment_id == segment_id)
            .map(|w| w.position_in_segment)
            .max()
            .unwrap_or(0)
            + 1;

        let appended = WordSegment::new(
            &parent,
            word.to_string(),
            start_ms,
            end_ms,
            confidence_milli,
            next_position,
        )
        .map_err(|e| RepositoryError::ConstraintViolation(e.to_string()))?;

        words.push(appended.clone());
        Ok(appended)
    }

    async fn segments_for_video(
        &self,
        video_id: VideoId,
    ) -> Result<Vec<AudioSegment>, RepositoryError> {
        let mut segments: Vec<AudioSegment> = self
            .segments
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.video_id == video_id)
            .cloned()
            .collect();
        segments.sort_by_key(|s| s.start_ms);
        Ok(segments)
    }

    async fn words_for_segment(
        &self,
        segment_id: SegmentId,
    ) -> Result<Vec<WordSegment>, RepositoryError> {
        let mut words: Vec<WordSegment> = self
            .words
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.audio_segment_id == segment_id)
            .cloned()
            .collect();
        words.sort_by_key(|w| w.position_in_segment);
        Ok(words)
    }
}
