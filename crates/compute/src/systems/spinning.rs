use std::sync::Arc;

use tasksys_core::{resolve_worker_threads, Batch, BatchId, Runnable, TaskSysError};
use tracing::{debug, error};

use crate::pool::{CountdownListener, IdlePolicy, WorkerPool};
use crate::queue::WorkQueue;

use super::{InlineIds, TaskSystem};

/// Persistent pool of busy-polling workers. `run` queues one item per
/// sub-task and busy-waits on the batch counter until it reaches zero.
pub struct SpinningTaskSystem {
    pool: WorkerPool,
    ids: InlineIds,
}

impl SpinningTaskSystem {
    pub fn new(num_threads: usize) -> Self {
        let pool = WorkerPool::new(
            resolve_worker_threads(num_threads),
            IdlePolicy::Spin,
            Arc::new(WorkQueue::new()),
            Arc::new(CountdownListener),
        );
        Self {
            pool,
            ids: InlineIds::default(),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }

    fn run_batch(&self, id: BatchId, runnable: Arc<dyn Runnable>, num_total_tasks: usize) {
        let batch = Arc::new(Batch::new(id, runnable, num_total_tasks));
        if let Err(e) = self.pool.queue().push_all(batch.work_items()) {
            error!("Could not queue {}: {}", id, e);
            return;
        }
        debug!("Spinning until {} completes", id);
        while !batch.is_complete() {
            std::hint::spin_loop();
        }
    }
}

impl TaskSystem for SpinningTaskSystem {
    fn name(&self) -> &'static str {
        "Parallel + Thread Pool + Spin"
    }

    fn run(&self, runnable: Arc<dyn Runnable>, num_total_tasks: usize) {
        match self.ids.issue(&[]) {
            Ok(id) => self.run_batch(id, runnable, num_total_tasks),
            Err(e) => error!("Spinning run failed: {}", e),
        }
    }

    fn run_async_with_deps(
        &self,
        runnable: Arc<dyn Runnable>,
        num_total_tasks: usize,
        deps: &[BatchId],
    ) -> Result<BatchId, TaskSysError> {
        let id = self.ids.issue(deps)?;
        debug!(
            "{} has no async execution; {} ({}, {} tasks) dropped",
            self.name(),
            id,
            runnable.name(),
            num_total_tasks
        );
        Ok(id)
    }

    fn sync(&self) {}
}
