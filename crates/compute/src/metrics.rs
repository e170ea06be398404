use serde::Serialize;

/// Snapshot of dependency-scheduler activity.
///
/// Counters are cumulative for the scheduler's lifetime; pruning tracker
/// entries after a `sync` does not reset them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskSysMetrics {
    /// Batches accepted by `run_async_with_deps`.
    pub batches_submitted: u64,
    /// Batches that had to wait on at least one dependency at submission.
    pub batches_deferred: u64,
    /// Batches whose every sub-task finished.
    pub batches_completed: u64,
    /// Sub-task invocations executed by workers.
    pub tasks_executed: u64,
    /// Batches submitted and not yet complete.
    pub outstanding_batches: usize,
    /// Tracker entries currently held.
    pub tracked_batches: usize,
}

impl TaskSysMetrics {
    /// Whether every batch submitted so far had completed at snapshot time.
    pub fn is_drained(&self) -> bool {
        self.outstanding_batches == 0
    }
}
