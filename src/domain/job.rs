use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Language, VideoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
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

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "WAITING",
            JobState::Delayed => "DELAYED",
            JobState::Active => "ACTIVE",
            JobState::Completed => "COMPLETED",
            JobState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(JobState::Waiting),
            "DELAYED" => Ok(JobState::Delayed),
            "ACTIVE" => Ok(JobState::Active),
            "COMPLETED" => Ok(JobState::Completed),
            "FAILED" => Ok(JobState::Failed),
            _ => Err(format!("Invalid job state: {}", s)),
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scheduling hints accepted at enqueue time. Higher priority dispatches
/// first; a delay parks the job as `Delayed` until `run_at`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    pub priority: i32,
    pub delay: Option<Duration>,
}

/// The durable record of one unit of transcription work.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub id: JobId,
    pub video_id: VideoId,
    pub audio_path: String,
    pub source_lang: Language,
    pub target_lang: Language,
    pub priority: i32,
    pub state: JobState,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub progress: u8,
    pub failed_reason: Option<String>,
    pub run_at: DateTime<Utc>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TranscriptionJob {
    pub fn new(
        video_id: VideoId,
        audio_path: String,
        source_lang: Language,
        target_lang: Language,
        max_attempts: u32,
        options: EnqueueOptions,
    ) -> Self {
        let now = Utc::now();
        let (state, run_at) = match options.delay {
            Some(delay) => {
                let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                (JobState::Delayed, now + delay)
            }
            None => (JobState::Waiting, now),
        };
        Self {
            id: JobId::new(),
            video_id,
            audio_path,
            source_lang,
            target_lang,
            priority: options.priority,
            state,
            attempts_made: 0,
            max_attempts,
            progress: 0,
            failed_reason: None,
            run_at,
            heartbeat_at: None,
            created_at: now,
            processed_at: None,
            finished_at: None,
        }
    }

    /// Delay before re-dispatching after attempt `attempts_made` failed:
    /// the base doubles with every attempt already made.
    pub fn backoff_delay(&self, base: Duration) -> Duration {
        let exponent = self.attempts_made.saturating_sub(1).min(16);
        base * 2u32.pow(exponent)
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}
