pub mod batch;
pub mod config;
pub mod error;
pub mod runnable;

pub use batch::{Batch, BatchId, WorkItem};
pub use config::{load_dotenv, resolve_worker_threads, Strategy, TaskSysConfig};
pub use error::*;
pub use runnable::Runnable;
