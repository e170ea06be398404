use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::runnable::Runnable;

/// Identifier of a submitted batch. Issued in increasing order, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(pub u64);

impl BatchId {
    pub fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> BatchId {
        BatchId(self.0 + 1)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{}", self.0)
    }
}

/// One submitted group of `total` sub-tasks sharing a runnable.
///
/// The batch counts down as its sub-tasks finish. The decrement that takes
/// `remaining` from 1 to 0 is the single point at which a batch becomes
/// complete; every later attempt is refused so the count never underflows.
pub struct Batch {
    id: BatchId,
    runnable: Arc<dyn Runnable>,
    total: usize,
    remaining: AtomicUsize,
}

impl Batch {
    pub fn new(id: BatchId, runnable: Arc<dyn Runnable>, total: usize) -> Self {
        Self {
            id,
            runnable,
            total,
            remaining: AtomicUsize::new(total),
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn runnable(&self) -> &Arc<dyn Runnable> {
        &self.runnable
    }

    /// Sub-tasks that have not finished yet.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Record one finished sub-task.
    ///
    /// Returns `true` for exactly one caller: the one whose completion
    /// finished the batch. Extra completions beyond `total` are ignored.
    pub fn record_completion(&self) -> bool {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous == 1,
            Err(_) => {
                tracing::warn!("{} received a completion after reaching zero", self.id);
                false
            }
        }
    }

    /// One work item per sub-task index, in increasing index order.
    pub fn work_items(self: &Arc<Self>) -> impl Iterator<Item = WorkItem> + '_ {
        (0..self.total).map(move |index| WorkItem {
            batch: Arc::clone(self),
            index,
        })
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("id", &self.id)
            .field("runnable", &self.runnable.name())
            .field("total", &self.total)
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// The atomic unit handed to a worker: sub-task `index` of its batch.
#[derive(Debug, Clone)]
pub struct WorkItem {
    batch: Arc<Batch>,
    index: usize,
}

impl WorkItem {
    pub fn batch(&self) -> &Arc<Batch> {
        &self.batch
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.batch.total
    }

    /// Invoke the runnable for this sub-task.
    pub fn execute(&self) {
        self.batch.runnable.run_task(self.index, self.batch.total);
    }
}
