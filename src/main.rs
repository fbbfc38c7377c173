use std::sync::Arc;

use wortschatz::application::ports::{
    JobRepository, TranscriptionEngine, VideoRepository,
};
use wortschatz::application::services::{
    AudioValidator, PipelineWorker, TranscriptionImporter, TranscriptionQueue,
};
use wortschatz::config::{Environment, Settings};
use wortschatz::infrastructure::engine::DockerEngine;
use wortschatz::infrastructure::observability::{init_tracing, TracingConfig};
use wortschatz::infrastructure::persistence::{
    create_pool, run_migrations, PgJobRepository, PgTranscriptRepository, PgVideoRepository,
};
use wortschatz::infrastructure::storage::LocalMediaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment)?;

    init_tracing(TracingConfig {
        environment: environment.to_string(),
        json_format: settings.logging.enable_json,
    });

    let pool = create_pool(&settings.database.url, settings.database.max_connections).await?;
    run_migrations(&pool).await?;

    let job_repository: Arc<dyn JobRepository> = Arc::new(PgJobRepository::new(pool.clone()));
    let video_repository: Arc<dyn VideoRepository> = Arc::new(PgVideoRepository::new(pool.clone()));
    let transcript_repository = Arc::new(PgTranscriptRepository::new(pool.clone()));

    for subdir in ["audios", "uploads"] {
        std::fs::create_dir_all(settings.storage.base_dir.join(subdir))?;
    }
    let store = Arc::new(LocalMediaStore::new(settings.storage.base_dir.clone())?);
    let validator = AudioValidator::new(store, settings.storage.base_dir.clone());

    let engine: Arc<dyn TranscriptionEngine> = Arc::new(DockerEngine::new(
        settings
            .engine
            .to_config(settings.storage.base_dir.join("audios")),
    ));
    // A missing sandbox runtime is fatal for the whole pipeline.
    engine.probe().await?;

    let importer = TranscriptionImporter::new(transcript_repository, Arc::clone(&video_repository));
    let worker = Arc::new(PipelineWorker::new(
        validator,
        engine,
        importer,
        Arc::clone(&video_repository),
    ));

    let queue = TranscriptionQueue::new(job_repository, settings.queue.to_config());
    queue.start(worker).await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, draining queue");
    queue.close().await;

    Ok(())
}
