mod docker_engine;
mod mock_engine;
mod progress;

pub use docker_engine::{DockerEngine, EngineConfig};
pub use mock_engine::{MockEngine, ALWAYS_FAIL};
pub use progress::ProgressMapper;
