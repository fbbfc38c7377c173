mod environment;
mod settings;

pub use environment::Environment;
pub use settings::{
    DatabaseSettings, EngineSettings, LoggingSettings, QueueSettings, Settings, StorageSettings,
};
