use tasksys_core::WorkItem;
use tracing::{debug, trace};

use crate::queue::{Polled, WorkQueue};

use super::{CompletionListener, IdlePolicy};

/// Body of every worker thread. Returns once the queue is shut down.
pub(super) fn run(
    worker_index: usize,
    policy: IdlePolicy,
    queue: &WorkQueue,
    listener: &dyn CompletionListener,
) {
    debug!("Worker {} started", worker_index);
    while let Some(item) = next_item(policy, queue) {
        execute(worker_index, &item, listener);
    }
    debug!("Worker {} exiting", worker_index);
}

fn next_item(policy: IdlePolicy, queue: &WorkQueue) -> Option<WorkItem> {
    match policy {
        IdlePolicy::Sleep => queue.pop_blocking(),
        IdlePolicy::Spin => loop {
            match queue.poll() {
                Polled::Item(item) => return Some(item),
                Polled::ShutDown => return None,
                Polled::Empty => std::hint::spin_loop(),
            }
        },
    }
}

fn execute(worker_index: usize, item: &WorkItem, listener: &dyn CompletionListener) {
    trace!(
        "Worker {} running {} task {}/{}",
        worker_index,
        item.batch_id(),
        item.index(),
        item.total()
    );
    item.execute();
    listener.task_finished(item);
}
