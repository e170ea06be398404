use thiserror::Error;

use crate::batch::BatchId;

#[derive(Error, Debug)]
pub enum TaskSysError {
    #[error("task system is shut down")]
    ShutDown,

    #[error("batch depends on {batch}, which has not been issued (next id is {next})")]
    UnknownDependency { batch: BatchId, next: BatchId },

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaskSysError>;
