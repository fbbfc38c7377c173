use chrono::{DateTime, Utc};

use super::VideoId;

/// One named phase of the pipeline, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStep {
    Transcription,
    DatabaseImport,
    Exercises,
    Pronunciations,
}

impl ProcessingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStep::Transcription => "transcription",
            ProcessingStep::DatabaseImport => "database_import",
            ProcessingStep::Exercises => "exercises",
            ProcessingStep::Pronunciations => "pronunciations",
        }
    }
}

impl std::str::FromStr for ProcessingStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcription" => Ok(ProcessingStep::Transcription),
            "database_import" => Ok(ProcessingStep::DatabaseImport),
            "exercises" => Ok(ProcessingStep::Exercises),
            "pronunciations" => Ok(ProcessingStep::Pronunciations),
            _ => Err(format!("Invalid processing step: {}", s)),
        }
    }
}

impl std::fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    Started,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Started => "started",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(StepStatus::Started),
            "completed" => Ok(StepStatus::Completed),
            "failed" => Ok(StepStatus::Failed),
            _ => Err(format!("Invalid step status: {}", s)),
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only: entries are never updated or deleted.
#[derive(Debug, Clone)]
pub struct ProcessingLogEntry {
    pub video_id: VideoId,
    pub step: ProcessingStep,
    pub status: StepStatus,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProcessingLogEntry {
    pub fn new(
        video_id: VideoId,
        step: ProcessingStep,
        status: StepStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            video_id,
            step,
            status,
            message,
            created_at: Utc::now(),
        }
    }
}
