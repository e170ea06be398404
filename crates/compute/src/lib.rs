pub mod metrics;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod systems;

pub use metrics::TaskSysMetrics;
pub use pool::{CompletionListener, CountdownListener, IdlePolicy, WorkerPool};
pub use queue::{Polled, WorkQueue};
pub use scheduler::{BatchState, BatchTracker, DependencyScheduler};
pub use systems::{
    build_task_system, SerialTaskSystem, SleepingTaskSystem, SpawnTaskSystem,
    SpinningTaskSystem, TaskSystem,
};
pub use tasksys_core::{BatchId, Runnable, Strategy, TaskSysConfig, TaskSysError};
