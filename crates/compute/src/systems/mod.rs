//! Interchangeable task systems behind one [`TaskSystem`] contract.
//!
//! | Strategy   | `run`                                   | `run_async_with_deps`     |
//! |------------|-----------------------------------------|---------------------------|
//! | `Serial`   | caller thread, index order              | no-op                     |
//! | `Spawn`    | one fresh thread per contiguous range   | no-op                     |
//! | `Spinning` | persistent spin pool, caller busy-waits | no-op                     |
//! | `Sleeping` | persistent sleep pool, then `sync`      | dependency scheduler      |
//!
//! Only the sleeping system executes asynchronous batches. The others still
//! issue an id and validate `deps`, then return without running anything;
//! their `sync` returns immediately. Check
//! [`supports_async`](TaskSystem::supports_async) before relying on
//! `run_async_with_deps` to do work.

mod serial;
mod sleeping;
mod spawn;
mod spinning;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tasksys_core::{BatchId, Runnable, Strategy, TaskSysConfig, TaskSysError};
use tracing::info;

use crate::metrics::TaskSysMetrics;

pub use serial::SerialTaskSystem;
pub use sleeping::SleepingTaskSystem;
pub use spawn::SpawnTaskSystem;
pub use spinning::SpinningTaskSystem;

pub trait TaskSystem: Send + Sync {
    /// Human-readable strategy name.
    fn name(&self) -> &'static str;

    /// Run sub-tasks `0..num_total_tasks` and return once all have finished.
    fn run(&self, runnable: Arc<dyn Runnable>, num_total_tasks: usize);

    /// Submit a batch that may start only after every batch in `deps` has
    /// completed. The returned id can be used as a dependency later.
    fn run_async_with_deps(
        &self,
        runnable: Arc<dyn Runnable>,
        num_total_tasks: usize,
        deps: &[BatchId],
    ) -> Result<BatchId, TaskSysError>;

    /// Block until every batch submitted through `run_async_with_deps` has
    /// completed.
    fn sync(&self);

    /// Whether `run_async_with_deps` executes the batch. When `false` it is a
    /// no-op that only hands out an id.
    fn supports_async(&self) -> bool {
        false
    }

    /// Scheduler counters, for systems that track batches.
    fn metrics(&self) -> Option<TaskSysMetrics> {
        None
    }

    /// [`run_async_with_deps`](TaskSystem::run_async_with_deps) without dependencies.
    fn run_async(
        &self,
        runnable: Arc<dyn Runnable>,
        num_total_tasks: usize,
    ) -> Result<BatchId, TaskSysError> {
        self.run_async_with_deps(runnable, num_total_tasks, &[])
    }
}

/// Build the task system selected by `config`.
pub fn build_task_system(config: &TaskSysConfig) -> Box<dyn TaskSystem> {
    let threads = config.resolved_worker_threads();
    let system: Box<dyn TaskSystem> = match config.strategy {
        Strategy::Serial => Box::new(SerialTaskSystem::new()),
        Strategy::Spawn => Box::new(SpawnTaskSystem::new(threads)),
        Strategy::Spinning => Box::new(SpinningTaskSystem::new(threads)),
        Strategy::Sleeping => Box::new(SleepingTaskSystem::new(threads)),
    };
    info!("Created '{}' task system ({} worker threads)", system.name(), threads);
    system
}

/// Id source for systems that run every batch to completion on submission.
#[derive(Debug, Default)]
struct InlineIds {
    next: AtomicU64,
}

impl InlineIds {
    /// Issue the next id, refusing dependencies that were never issued.
    fn issue(&self, deps: &[BatchId]) -> Result<BatchId, TaskSysError> {
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| {
                deps.iter().all(|dep| dep.get() < next).then_some(next + 1)
            })
            .map(BatchId)
            .map_err(|next| {
                let batch = deps
                    .iter()
                    .copied()
                    .find(|dep| dep.get() >= next)
                    .unwrap_or(BatchId(next));
                TaskSysError::UnknownDependency {
                    batch,
                    next: BatchId(next),
                }
            })
    }
}
