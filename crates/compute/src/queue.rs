use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tasksys_core::{TaskSysError, WorkItem};
use tracing::debug;

/// Outcome of a non-blocking poll.
#[derive(Debug)]
pub enum Polled {
    Item(WorkItem),
    Empty,
    ShutDown,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<WorkItem>,
    shut_down: bool,
}

/// Shared FIFO of work items with an explicit shutdown state.
///
/// Sleeping consumers park on a condition variable; spinning consumers poll
/// with [`try_pop`](WorkQueue::try_pop). Shutdown discards whatever is still
/// queued and wakes every parked consumer.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // Nothing runs user code while holding this lock, so a poisoned guard
    // still protects a consistent queue.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one item and wake one waiter.
    pub fn push(&self, item: WorkItem) -> Result<(), TaskSysError> {
        {
            let mut state = self.lock();
            if state.shut_down {
                debug!("Rejected work item for {}: queue is shut down", item.batch_id());
                return Err(TaskSysError::ShutDown);
            }
            state.items.push_back(item);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Append a run of items under a single lock acquisition.
    ///
    /// Returns the number of items queued.
    pub fn push_all<I>(&self, items: I) -> Result<usize, TaskSysError>
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let pushed = {
            let mut state = self.lock();
            if state.shut_down {
                debug!("Rejected work items: queue is shut down");
                return Err(TaskSysError::ShutDown);
            }
            let before = state.items.len();
            state.items.extend(items);
            state.items.len() - before
        };
        match pushed {
            0 => {}
            1 => self.available.notify_one(),
            _ => self.available.notify_all(),
        }
        Ok(pushed)
    }

    /// Wait until an item is available or the queue shuts down.
    ///
    /// Returns `None` only once the queue has been shut down.
    pub fn pop_blocking(&self) -> Option<WorkItem> {
        let mut state = self.lock();
        loop {
            if state.shut_down {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Non-blocking pop that tells an empty queue apart from a shut-down one
    /// under a single lock acquisition. Used by spinning consumers.
    pub fn poll(&self) -> Polled {
        let mut state = self.lock();
        if state.shut_down {
            return Polled::ShutDown;
        }
        match state.items.pop_front() {
            Some(item) => Polled::Item(item),
            None => Polled::Empty,
        }
    }

    pub fn try_pop(&self) -> Option<WorkItem> {
        match self.poll() {
            Polled::Item(item) => Some(item),
            Polled::Empty | Polled::ShutDown => None,
        }
    }

    /// Mark the queue shut down, drop queued items and wake every waiter.
    /// Idempotent.
    pub fn shutdown(&self) {
        let dropped = {
            let mut state = self.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            std::mem::take(&mut state.items)
        };
        if !dropped.is_empty() {
            debug!("Queue shut down with {} unstarted items discarded", dropped.len());
        }
        self.available.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
