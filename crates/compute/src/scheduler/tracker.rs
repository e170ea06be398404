use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tasksys_core::{Batch, BatchId, Runnable, TaskSysError};
use tracing::debug;

/// Lifecycle of a tracked batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Waiting for at least one dependency to complete.
    Pending,
    /// Work items handed to the queue.
    Released,
    /// Every sub-task finished.
    Complete,
}

#[derive(Debug)]
struct TrackedBatch {
    batch: Arc<Batch>,
    required_deps: Vec<BatchId>,
    outstanding_deps: HashSet<BatchId>,
    dependents: Vec<BatchId>,
    state: BatchState,
}

/// Effect of a submission or completion on the rest of the graph.
#[derive(Debug, Default)]
pub struct Release {
    /// Batches whose work items must now be queued.
    pub ready: Vec<Arc<Batch>>,
    /// Batches that became complete, including the one that triggered this.
    pub completed: usize,
}

/// Per-batch completion state and the dependency edges between batches.
///
/// Not synchronized itself; the scheduler keeps it behind one mutex so that
/// registering a dependent and completing its dependency can never interleave.
#[derive(Debug, Default)]
pub struct BatchTracker {
    next_id: u64,
    /// Every id below this was pruned after a full drain and is complete.
    retired_below: u64,
    entries: HashMap<BatchId, TrackedBatch>,
    submitted: u64,
    deferred: u64,
    completed: u64,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next submission will receive.
    pub fn next_id(&self) -> BatchId {
        BatchId(self.next_id)
    }

    /// Register a new batch depending on `deps`.
    ///
    /// Dependencies must name batches issued earlier. Since ids only grow,
    /// this also rules out cycles.
    pub fn submit(
        &mut self,
        runnable: Arc<dyn Runnable>,
        total: usize,
        deps: &[BatchId],
    ) -> Result<(BatchId, Release), TaskSysError> {
        if let Some(&unknown) = deps.iter().find(|dep| dep.get() >= self.next_id) {
            return Err(TaskSysError::UnknownDependency {
                batch: unknown,
                next: self.next_id(),
            });
        }

        let id = BatchId(self.next_id);
        self.next_id += 1;
        self.submitted += 1;

        let mut required_deps = deps.to_vec();
        required_deps.sort_unstable();
        required_deps.dedup();

        let mut outstanding_deps = HashSet::new();
        for &dep in &required_deps {
            if self.is_complete(dep) {
                continue;
            }
            if let Some(entry) = self.entries.get_mut(&dep) {
                entry.dependents.push(id);
                outstanding_deps.insert(dep);
            }
        }

        let pending = !outstanding_deps.is_empty();
        self.entries.insert(
            id,
            TrackedBatch {
                batch: Arc::new(Batch::new(id, runnable, total)),
                required_deps,
                outstanding_deps,
                dependents: Vec::new(),
                state: BatchState::Pending,
            },
        );

        let mut release = Release::default();
        if pending {
            self.deferred += 1;
            debug!("{} deferred until its dependencies complete", id);
        } else {
            self.release_cascade(vec![id], &mut release);
        }
        Ok((id, release))
    }

    /// Record that every sub-task of `id` finished and release whichever
    /// dependents were waiting only on it.
    pub fn complete(&mut self, id: BatchId) -> Release {
        let mut release = Release::default();
        let newly_ready = self.mark_complete(id, &mut release);
        self.release_cascade(newly_ready, &mut release);
        release
    }

    /// Move `candidates` from pending to released. Empty batches complete on
    /// the spot, which can release their own dependents in turn.
    fn release_cascade(&mut self, mut candidates: Vec<BatchId>, release: &mut Release) {
        while let Some(id) = candidates.pop() {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            if entry.state != BatchState::Pending {
                continue;
            }
            entry.state = BatchState::Released;
            if entry.batch.total() == 0 {
                candidates.extend(self.mark_complete(id, release));
            } else {
                debug!("{} released with {} tasks", id, entry.batch.total());
                release.ready.push(Arc::clone(&entry.batch));
            }
        }
    }

    /// Flag `id` complete and return dependents whose last dependency it was.
    fn mark_complete(&mut self, id: BatchId, release: &mut Release) -> Vec<BatchId> {
        let dependents = match self.entries.get_mut(&id) {
            Some(entry) if entry.state != BatchState::Complete => {
                entry.state = BatchState::Complete;
                std::mem::take(&mut entry.dependents)
            }
            _ => return Vec::new(),
        };
        self.completed += 1;
        release.completed += 1;
        debug!("{} complete, {} dependents notified", id, dependents.len());

        dependents
            .into_iter()
            .filter(|dependent| {
                self.entries.get_mut(dependent).is_some_and(|entry| {
                    entry.outstanding_deps.remove(&id);
                    entry.outstanding_deps.is_empty()
                })
            })
            .collect()
    }

    pub fn is_complete(&self, id: BatchId) -> bool {
        if id.get() < self.retired_below {
            return true;
        }
        self.entries
            .get(&id)
            .is_some_and(|entry| entry.state == BatchState::Complete)
    }

    /// State of a batch still held by the tracker. `None` once pruned.
    pub fn state(&self, id: BatchId) -> Option<BatchState> {
        self.entries.get(&id).map(|entry| entry.state)
    }

    /// Dependencies `id` was submitted with.
    pub fn required_deps(&self, id: BatchId) -> Option<&[BatchId]> {
        self.entries
            .get(&id)
            .map(|entry| entry.required_deps.as_slice())
    }

    /// Drop every entry once all of them are complete. Returns how many were
    /// removed; nothing is pruned while any batch is still outstanding.
    pub fn prune(&mut self) -> usize {
        if self
            .entries
            .values()
            .any(|entry| entry.state != BatchState::Complete)
        {
            return 0;
        }
        let pruned = self.entries.len();
        self.entries.clear();
        self.retired_below = self.next_id;
        pruned
    }

    /// Entries currently held (complete ones included, until pruned).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    pub fn deferred(&self) -> u64 {
        self.deferred
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<dyn Runnable> {
        Arc::new(|_: usize, _: usize| {})
    }

    fn ready_ids(release: &Release) -> Vec<BatchId> {
        let mut ids: Vec<BatchId> = release.ready.iter().map(|b| b.id()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn independent_batch_is_released_immediately() {
        let mut tracker = BatchTracker::new();
        let (id, release) = tracker.submit(noop(), 4, &[]).unwrap();
        assert_eq!(id, BatchId(0));
        assert_eq!(ready_ids(&release), vec![BatchId(0)]);
        assert_eq!(tracker.state(id), Some(BatchState::Released));
    }

    #[test]
    fn ids_are_monotonic() {
        let mut tracker = BatchTracker::new();
        let ids: Vec<BatchId> = (0..5)
            .map(|_| tracker.submit(noop(), 1, &[]).unwrap().0)
            .collect();
        assert_eq!(ids, (0..5).map(BatchId).collect::<Vec<_>>());
        assert_eq!(tracker.next_id(), BatchId(5));
    }

    #[test]
    fn dependent_waits_for_every_dependency() {
        let mut tracker = BatchTracker::new();
        let (a, _) = tracker.submit(noop(), 2, &[]).unwrap();
        let (b, _) = tracker.submit(noop(), 2, &[]).unwrap();
        let (c, release) = tracker.submit(noop(), 2, &[a, b]).unwrap();
        assert!(release.ready.is_empty());
        assert_eq!(tracker.state(c), Some(BatchState::Pending));
        assert_eq!(tracker.deferred(), 1);

        let release = tracker.complete(a);
        assert!(release.ready.is_empty());
        assert_eq!(release.completed, 1);
        assert_eq!(tracker.state(c), Some(BatchState::Pending));

        let release = tracker.complete(b);
        assert_eq!(ready_ids(&release), vec![c]);
        assert_eq!(tracker.state(c), Some(BatchState::Released));
    }

    #[test]
    fn dependency_on_complete_batch_is_already_satisfied() {
        let mut tracker = BatchTracker::new();
        let (a, _) = tracker.submit(noop(), 1, &[]).unwrap();
        tracker.complete(a);
        let (b, release) = tracker.submit(noop(), 1, &[a]).unwrap();
        assert_eq!(ready_ids(&release), vec![b]);
    }

    #[test]
    fn duplicate_dependencies_count_once() {
        let mut tracker = BatchTracker::new();
        let (a, _) = tracker.submit(noop(), 1, &[]).unwrap();
        let (b, _) = tracker.submit(noop(), 1, &[a, a, a]).unwrap();
        assert_eq!(tracker.required_deps(b), Some(&[a][..]));
        let release = tracker.complete(a);
        assert_eq!(ready_ids(&release), vec![b]);
    }

    #[test]
    fn unissued_dependency_is_rejected() {
        let mut tracker = BatchTracker::new();
        let err = tracker.submit(noop(), 1, &[BatchId(0)]).unwrap_err();
        assert!(matches!(
            err,
            TaskSysError::UnknownDependency { batch: BatchId(0), next: BatchId(0) }
        ));
        // A rejected submission does not consume an id.
        assert_eq!(tracker.next_id(), BatchId(0));
    }

    #[test]
    fn empty_batches_complete_and_cascade() {
        let mut tracker = BatchTracker::new();
        let (a, _) = tracker.submit(noop(), 3, &[]).unwrap();
        let (b, release) = tracker.submit(noop(), 0, &[a]).unwrap();
        assert!(release.ready.is_empty());
        let (c, _) = tracker.submit(noop(), 0, &[b]).unwrap();
        let (d, _) = tracker.submit(noop(), 2, &[c]).unwrap();

        let release = tracker.complete(a);
        assert_eq!(release.completed, 3);
        assert_eq!(ready_ids(&release), vec![d]);
        assert!(tracker.is_complete(b));
        assert!(tracker.is_complete(c));
    }

    #[test]
    fn empty_independent_batch_completes_at_submission() {
        let mut tracker = BatchTracker::new();
        let (a, release) = tracker.submit(noop(), 0, &[]).unwrap();
        assert!(release.ready.is_empty());
        assert_eq!(release.completed, 1);
        assert!(tracker.is_complete(a));
    }

    #[test]
    fn completing_twice_is_harmless() {
        let mut tracker = BatchTracker::new();
        let (a, _) = tracker.submit(noop(), 1, &[]).unwrap();
        assert_eq!(tracker.complete(a).completed, 1);
        assert_eq!(tracker.complete(a).completed, 0);
        assert_eq!(tracker.completed(), 1);
    }

    #[test]
    fn prune_retires_ids_only_when_drained() {
        let mut tracker = BatchTracker::new();
        let (a, _) = tracker.submit(noop(), 1, &[]).unwrap();
        assert_eq!(tracker.prune(), 0);

        tracker.complete(a);
        assert_eq!(tracker.prune(), 1);
        assert!(tracker.is_empty());
        assert_eq!(tracker.state(a), None);
        assert!(tracker.is_complete(a));

        let (b, release) = tracker.submit(noop(), 1, &[a]).unwrap();
        assert_eq!(b, BatchId(1));
        assert_eq!(ready_ids(&release), vec![b]);
        assert_eq!(tracker.submitted(), 2);
    }
}
