use std::ops::Range;
use std::sync::Arc;
use std::thread;

use tasksys_core::{resolve_worker_threads, BatchId, Runnable, TaskSysError};
use tracing::{debug, trace};

use super::{InlineIds, TaskSystem};

/// Spawns fresh threads on every `run`, one per contiguous index range, and
/// joins them before returning. No pool survives between calls.
#[derive(Debug)]
pub struct SpawnTaskSystem {
    num_threads: usize,
    ids: InlineIds,
}

impl SpawnTaskSystem {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads: resolve_worker_threads(num_threads),
            ids: InlineIds::default(),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

/// Split `0..total` into `min(total, threads)` contiguous ranges of
/// `total / parts` indices; the last range absorbs the remainder.
pub(crate) fn partition(total: usize, threads: usize) -> Vec<Range<usize>> {
    let parts = total.min(threads.max(1));
    if parts == 0 {
        return Vec::new();
    }
    let per_part = total / parts;
    (0..parts)
        .map(|part| {
            let start = part * per_part;
            let end = if part + 1 == parts { total } else { start + per_part };
            start..end
        })
        .collect()
}

impl TaskSystem for SpawnTaskSystem {
    fn name(&self) -> &'static str {
        "Parallel + Always Spawn"
    }

    fn run(&self, runnable: Arc<dyn Runnable>, num_total_tasks: usize) {
        let ranges = partition(num_total_tasks, self.num_threads);
        let runnable = runnable.as_ref();
        thread::scope(|scope| {
            for range in ranges {
                scope.spawn(move || {
                    trace!("Spawned thread running tasks {:?}", range);
                    for index in range {
                        runnable.run_task(index, num_total_tasks);
                    }
                });
            }
        });
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
