mod mock_repository;
mod pg_job_repository;
mod pg_transcript_repository;
mod pg_video_repository;

pub use mock_repository::MockJobRepository;
pub use mock_repository::MockTranscriptRepository;
pub use mock_repository::MockVideoRepository;
pub use pg_job_repository::PgJobRepository;
pub use pg_transcript_repository::PgTranscriptRepository;
pub use pg_video_repository::PgVideoRepository;
