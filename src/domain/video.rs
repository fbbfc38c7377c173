use chrono::{DateTime, Utc};

use super::Language;

/// Videos are created by the upload collaborator; the pipeline only ever
/// drives their status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoId(i64);

impl VideoId {
    pub fn from_i64(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Video {
    pub id: VideoId,
    pub original_filename: String,
    pub storage_path: String,
    pub size_bytes: u64,
    pub language: Language,
    pub transcription_status: TranscriptionStatus,
    pub error_message: Option<String>,
    pub transcript_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Lifecycle: `Pending -> Processing -> {Completed | Failed}`. A failed
/// video re-enters `Processing` only through an explicit external retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranscriptionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionStatus::Pending => "PENDING",
            TranscriptionStatus::Processing => "PROCESSING",
            TranscriptionStatus::Completed => "COMPLETED",
            TranscriptionStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for TranscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TranscriptionStatus::Pending),
            "PROCESSING" => Ok(TranscriptionStatus::Processing),
            "COMPLETED" => Ok(TranscriptionStatus::Completed),
            "FAILED" => Ok(TranscriptionStatus::Failed),
            _ => Err(format!("Invalid transcription status: {}", s)),
        }
    }
}

impl std::fmt::Display for TranscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
