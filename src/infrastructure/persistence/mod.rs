mod pg_pool;
mod repositories;

pub use pg_pool::{create_pool, run_migrations};

pub use repositories::MockJobRepository;
pub use repositories::MockTranscriptRepository;
pub use repositories::MockVideoRepository;
pub use repositories::PgJobRepository;
pub use repositories::PgTranscriptRepository;
pub use repositories::PgVideoRepository;
