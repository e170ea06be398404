use std::sync::Arc;

use tasksys_core::{BatchId, Runnable, TaskSysError};
use tracing::debug;

use super::{InlineIds, TaskSystem};

/// Runs every sub-task on the caller's thread in index order. The baseline
/// the parallel systems are checked against.
#[derive(Debug, Default)]
pub struct SerialTaskSystem {
    ids: InlineIds,
}

impl SerialTaskSystem {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskSystem for SerialTaskSystem {
    fn name(&self) -> &'static str {
        "Serial"
    }

    fn run(&self, runnable: Arc<dyn Runnable>, num_total_tasks: usize) {
        for index in 0..num_total_tasks {
            runnable.run_task(index, num_total_tasks);
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
