use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::application::ports::{
    EngineError, EngineRequest, RepositoryError, TranscriptionEngine, VideoRepository,
};
use crate::domain::{
    ProcessingLogEntry, ProcessingStep, StepStatus, TranscriptionJob, VideoId,
};

use super::audio_validator::{AudioValidationError, AudioValidator};
use super::import_service::{ImportError, ImportSummary, TranscriptionImporter};

/// The queue dispatches each admitted job to a processor. The seam exists
/// so queue behavior (concurrency, retry, stalls) is testable with stub
/// processors.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(
        &self,
        job: &TranscriptionJob,
        progress: watch::Sender<u8>,
    ) -> Result<(), PipelineError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(#[from] AudioValidationError),
    #[error("engine: {0}")]
    Engine(#[from] EngineError),
    #[error("import: {0}")]
    Import(#[from] ImportError),
    #[error("ledger: {0}")]
    Ledger(#[from] RepositoryError),
}

impl PipelineError {
    /// Subprocess and store faults are worth re-attempting within the
    /// queue's budget; bad input paths and bad output data are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Engine(_) | PipelineError::Ledger(_))
    }
}

/// Runs one job end to end: validate the audio, supervise the engine,
/// import its output, and keep the video ledger in step the whole way.
pub struct PipelineWorker {
    validator: AudioValidator,
    engine: Arc<dyn TranscriptionEngine>,
    importer: TranscriptionImporter,
    ledger: Arc<dyn VideoRepository>,
}

impl PipelineWorker {
    pub fn new(
        validator: AudioValidator,
        engine: Arc<dyn TranscriptionEngine>,
        importer: TranscriptionImporter,
        ledger: Arc<dyn VideoRepository>,
    ) -> Self {
        Self {
            validator,
            engine,
            importer,
            ledger,
        }
    }

    async fn run_pipeline(
        &self,
        job: &TranscriptionJob,
        progress: watch::Sender<u8>,
    ) -> Result<ImportSummary, PipelineError> {
        let video_id = job.video_id;

        self.ledger.mark_processing(video_id).await?;
        self.log(video_id, ProcessingStep::Transcription, StepStatus::Started, None)
            .await?;

        let audio = match self.validator.validate(&job.audio_path).await {
            Ok(audio) => audio,
            Err(e) => {
                self.log(
                    video_id,
                    ProcessingStep::Transcription,
                    StepStatus::Failed,
                    Some(e.to_string()),
                )
                .await?;
                return Err(e.into());
            }
        };

        let request = EngineRequest {
            video_id,
            audio_path: audio.absolute.clone(),
            relative_audio: audio.relative.filename().to_string(),
            source_lang: job.source_lang,
            target_lang: job.target_lang,
        };

        let run = match self.engine.run(&request, progress).await {
            Ok(run) => run,
            Err(e) => {
                self.log(
                    video_id,
                    ProcessingStep::Transcription,
                    StepStatus::Failed,
                    Some(e.to_string()),
                )
                .await?;
                return Err(e.into());
            }
        };
        self.log(
            video_id,
            ProcessingStep::Transcription,
            StepStatus::Completed,
            Some(format!("engine finished in {}s", run.duration.as_secs())),
        )
        .await?;

        // The importer brackets its own stages in the ledger.
        let summary = self.importer.load(video_id, &run.output_path).await?;

        self.ledger
            .mark_completed(video_id, &run.output_path.to_string_lossy())
            .await?;

        if let Some(info_path) = &run.info_path {
            if let Err(e) = tokio::fs::remove_file(info_path).await {
                tracing::warn!(
                    error = %e,
                    path = %info_path.display(),
                    "Failed to delete leftover engine info file"
                );
            }
        }

        Ok(summary)
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

#[async_trait]
impl JobProcessor for PipelineWorker {
    async fn process(
        &self,
        job: &TranscriptionJob,
        progress: watch::Sender<u8>,
    ) -> Result<(), PipelineError> {
        let result = self.run_pipeline(job, progress).await;

        match &result {
            Ok(summary) => {
                tracing::info!(
                    video_id = %job.video_id,
                    job_id = %job.id.as_uuid(),
                    segments = summary.segments,
                    vocabulary = summary.vocabulary,
                    language = %summary.language,
                    "Pipeline completed"
                );
            }
            Err(e) => {
                // The failure still propagates to the queue; the ledger
                // write is the user-visible trail.
                if let Err(ledger_err) = self.ledger.mark_failed(job.video_id, &e.to_string()).await
                {
                    tracing::error!(
                        video_id = %job.video_id,
                        error = %ledger_err,
                        "Failed to record pipeline failure on the video"
                    );
                }
            }
        }

        result.map(|_| ())
    }
}
