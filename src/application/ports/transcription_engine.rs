use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{Language, VideoId};

/// Everything the engine needs to process one job.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub video_id: VideoId,
    /// Absolute path of the validated audio file.
    pub audio_path: PathBuf,
    /// Path of the audio relative to the mounted input directory.
    pub relative_audio: String,
    pub source_lang: Language,
    pub target_lang: Language,
}

/// A successful engine run.
#[derive(Debug, Clone)]
pub struct EngineRun {
    /// The structured output document the importer consumes.
    pub output_path: PathBuf,
    /// Auxiliary info file the engine leaves next to the output, if any.
    pub info_path: Option<PathBuf>,
    pub duration: Duration,
}

/// The external transcription/translation engine, invoked as a sandboxed
/// subprocess per job. Progress (0-100) is published on the watch channel
/// as milestones appear on the subprocess's stdout.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Verifies the sandboxed execution environment exists. Failure here is
    /// fatal for the whole pipeline, not a per-job error.
    async fn probe(&self) -> Result<(), EngineError>;

    async fn run(
        &self,
        request: &EngineRequest,
        progress: watch::Sender<u8>,
    ) -> Result<EngineRun, EngineError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("sandbox runtime unavailable: {0}")]
    RuntimeUnavailable(String),
    #[error("failed to spawn engine: {0}")]
    SpawnFailed(String),
    #[error("engine exited with code {code}: {stderr}")]
    ExitFailure { code: i32, stderr: String },
    #[error("engine killed by signal: {0}")]
    Killed(String),
    #[error("engine exceeded the {}s wall-clock budget", .timeout.as_secs())]
    TimedOut { timeout: Duration },
    #[error("engine reported success but produced no output at {}", .0.display())]
    MissingOutput(PathBuf),
}
