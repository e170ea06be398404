//! Dependency-aware batch scheduler.
//!
//! Batches are submitted with the ids of the batches they must wait for. A
//! batch's work items reach the queue only once every dependency completed;
//! release is driven by completion events (an online topological sort), never
//! by polling. [`DependencyScheduler::sync`] blocks until everything submitted
//! so far has drained.
//!
//! - `tracker`: per-batch state and dependency edges

pub mod tracker;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tasksys_core::{BatchId, Runnable, TaskSysError, WorkItem};
use tracing::{debug, error};

use crate::metrics::TaskSysMetrics;
use crate::pool::CompletionListener;
use crate::queue::WorkQueue;

pub use tracker::{BatchState, BatchTracker, Release};

pub struct DependencyScheduler {
    queue: Arc<WorkQueue>,
    tracker: Mutex<BatchTracker>,
    /// Batches submitted and not yet complete. Only changed with `tracker`
    /// locked, so `drained` waiters cannot miss the final decrement.
    outstanding: AtomicUsize,
    drained: Condvar,
    tasks_executed: AtomicU64,
}

impl DependencyScheduler {
    pub fn new(queue: Arc<WorkQueue>) -> Self {
        Self {
            queue,
            tracker: Mutex::new(BatchTracker::new()),
            outstanding: AtomicUsize::new(0),
            drained: Condvar::new(),
            tasks_executed: AtomicU64::new(0),
        }
    }

    // The tracker is never left half-updated and no runnable executes under
    // this lock, so recovering a poisoned guard is sound.
    fn lock(&self) -> MutexGuard<'_, BatchTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit `total` sub-tasks of `runnable` to run after every batch in
    /// `deps` has completed. Returns immediately with the new batch's id.
    pub fn submit(
        &self,
        runnable: Arc<dyn Runnable>,
        total: usize,
        deps: &[BatchId],
    ) -> Result<BatchId, TaskSysError> {
        if self.queue.is_shut_down() {
            return Err(TaskSysError::ShutDown);
        }
        let name = runnable.name().to_string();
        let (id, release) = {
            let mut tracker = self.lock();
            let (id, release) = tracker.submit(runnable, total, deps)?;
            self.outstanding.fetch_add(1, Ordering::AcqRel);
            self.settle(&release);
            (id, release)
        };
        debug!("Submitted {} ({}, {} tasks, deps {:?})", id, name, total, deps);
        self.enqueue(release);
        Ok(id)
    }

    /// Account for batches a release completed. Caller holds the tracker lock.
    fn settle(&self, release: &Release) {
        if release.completed == 0 {
            return;
        }
        let before = self.outstanding.fetch_sub(release.completed, Ordering::AcqRel);
        if before == release.completed {
            self.drained.notify_all();
        }
    }

    fn enqueue(&self, release: Release) {
        for batch in release.ready {
            match self.queue.push_all(batch.work_items()) {
                Ok(_) => {}
                Err(TaskSysError::ShutDown) => {
                    debug!("{} released after shutdown; not queued", batch.id());
                }
                Err(e) => error!("Could not queue {}: {}", batch.id(), e),
            }
        }
    }

    fn batch_finished(&self, id: BatchId) {
        let release = {
            let mut tracker = self.lock();
            let release = tracker.complete(id);
            self.settle(&release);
            release
        };
        self.enqueue(release);
    }

    /// Block until every submitted batch, deferred ones included, is complete.
    /// Tracker entries are pruned afterwards; their ids count as complete
    /// when named as dependencies later.
    pub fn sync(&self) {
        let mut tracker = self.lock();
        while self.outstanding.load(Ordering::Acquire) > 0 {
            tracker = self
                .drained
                .wait(tracker)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let pruned = tracker.prune();
        if pruned > 0 {
            debug!("Sync drained; pruned {} completed batches", pruned);
        }
    }

    /// Batches not yet complete.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    pub fn is_complete(&self, id: BatchId) -> bool {
        self.lock().is_complete(id)
    }

    pub fn state(&self, id: BatchId) -> Option<BatchState> {
        self.lock().state(id)
    }

    pub fn metrics(&self) -> TaskSysMetrics {
        let tracker = self.lock();
        TaskSysMetrics {
            batches_submitted: tracker.submitted(),
            batches_deferred: tracker.deferred(),
            batches_completed: tracker.completed(),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            outstanding_batches: self.outstanding(),
            tracked_batches: tracker.len(),
        }
    }
}

impl CompletionListener for DependencyScheduler {
    fn task_finished(&self, item: &WorkItem) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        if item.batch().record_completion() {
            self.batch_finished(item.batch_id());
        }
    }
}
