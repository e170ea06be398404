use std::sync::Arc;

use tasksys_core::{resolve_worker_threads, BatchId, Runnable, TaskSysError};
use tracing::error;

use crate::metrics::TaskSysMetrics;
use crate::pool::{IdlePolicy, WorkerPool};
use crate::queue::WorkQueue;
use crate::scheduler::DependencyScheduler;

use super::TaskSystem;

/// Persistent pool of sleeping workers fed by the dependency scheduler.
///
/// Dropping the system does not wait for submitted work: call
/// [`sync`](TaskSystem::sync) first if completion matters.
pub struct SleepingTaskSystem {
    pool: WorkerPool,
    scheduler: Arc<DependencyScheduler>,
}

impl SleepingTaskSystem {
    pub fn new(num_threads: usize) -> Self {
        let queue = Arc::new(WorkQueue::new());
        let scheduler = Arc::new(DependencyScheduler::new(Arc::clone(&queue)));
        let pool = WorkerPool::new(
            resolve_worker_threads(num_threads),
            IdlePolicy::Sleep,
            queue,
            scheduler.clone(),
        );
        Self { pool, scheduler }
    }

    pub fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }

    pub fn scheduler(&self) -> &DependencyScheduler {
        &self.scheduler
    }
}

impl TaskSystem for SleepingTaskSystem {
    fn name(&self) -> &'static str {
        "Parallel + Thread Pool + Sleep"
    }

    fn run(&self, runnable: Arc<dyn Runnable>, num_total_tasks: usize) {
        match self.run_async(runnable, num_total_tasks) {
            Ok(_) => self.sync(),
            Err(e) => error!("Sleeping run failed: {}", e),
        }
    }

    fn run_async_with_deps(
        &self,
        runnable: Arc<dyn Runnable>,
        num_total_tasks: usize,
        deps: &[BatchId],
    ) -> Result<BatchId, TaskSysError> {
        self.scheduler.submit(runnable, num_total_tasks, deps)
    }

    fn sync(&self) {
        self.scheduler.sync();
    }

    fn supports_async(&self) -> bool {
        true
    }

    fn metrics(&self) -> Option<TaskSysMetrics> {
        Some(self.scheduler.metrics())
    }
}
