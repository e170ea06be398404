/// A unit of work that can be split into `total` independent sub-tasks.
///
/// The task systems call [`run_task`](Runnable::run_task) once for every index
/// in `0..total`, possibly from several threads at the same time. Any state the
/// sub-tasks share is the implementor's to synchronize.
///
/// A panic inside `run_task` is not caught: the worker thread running it dies
/// and the batch it belongs to never completes.
pub trait Runnable: Send + Sync {
    /// Execute sub-task `index` of `total`.
    fn run_task(&self, index: usize, total: usize);

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "runnable"
    }
}

impl<F> Runnable for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn run_task(&self, index: usize, total: usize) {
        self(index, total)
    }
}
