//! Fixed-size worker pool draining a shared [`WorkQueue`].
//!
//! The per-thread loop and its two idle policies live in `worker`.
//!
//! Workers know nothing about dependencies. After executing an item they hand
//! it to a [`CompletionListener`], which owns all batch bookkeeping.

mod worker;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tasksys_core::WorkItem;
use tracing::{error, info};

use crate::queue::WorkQueue;

/// How an idle worker waits for work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdlePolicy {
    /// Busy-poll the queue without ever parking the thread.
    Spin,
    /// Park on the queue's condition variable.
    Sleep,
}

/// Receives every finished work item.
pub trait CompletionListener: Send + Sync {
    fn task_finished(&self, item: &WorkItem);
}

/// Listener that only counts the item down on its own batch.
#[derive(Debug, Default)]
pub struct CountdownListener;

impl CompletionListener for CountdownListener {
    fn task_finished(&self, item: &WorkItem) {
        item.batch().record_completion();
    }
}

/// Owns `T` worker threads for its whole lifetime.
///
/// Dropping the pool shuts the queue down (discarding unstarted items), lets
/// in-flight items finish and joins every thread.
pub struct WorkerPool {
    queue: Arc<WorkQueue>,
    policy: IdlePolicy,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `num_threads` workers (at least one) on `queue`.
    pub fn new(
        num_threads: usize,
        policy: IdlePolicy,
        queue: Arc<WorkQueue>,
        listener: Arc<dyn CompletionListener>,
    ) -> Self {
        let num_threads = num_threads.max(1);
        let workers = (0..num_threads)
            .map(|worker_index| {
                let queue = Arc::clone(&queue);
                let listener = Arc::clone(&listener);
                thread::Builder::new()
                    .name(format!("tasksys-worker-{worker_index}"))
                    .spawn(move || worker::run(worker_index, policy, &queue, listener.as_ref()))
                    .expect("Failed to spawn worker thread")
            })
            .collect();
        info!("Worker pool started with {} {:?} workers", num_threads, policy);
        Self {
            queue,
            policy,
            workers,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    pub fn policy(&self) -> IdlePolicy {
        self.policy
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.shutdown();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!("Worker thread {} panicked while running a task", name);
            }
        }
        info!("Worker pool stopped");
    }
}
