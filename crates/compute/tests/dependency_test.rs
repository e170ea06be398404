//! Ordering and barrier guarantees of the sleeping task system's dependency
//! scheduler.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tasksys_compute::{BatchId, Runnable, SleepingTaskSystem, TaskSystem};

/// Monotonic logical clock shared by every runnable in a test.
#[derive(Default)]
struct Clock(AtomicU64);

impl Clock {
    fn tick(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Records the start and end tick of every sub-task.
struct TimedRunnable {
    clock: Arc<Clock>,
    spans: Mutex<Vec<(u64, u64)>>,
    work: Duration,
}

impl TimedRunnable {
    fn new(clock: &Arc<Clock>, work: Duration) -> Arc<Self> {
        Arc::new(Self {
            clock: Arc::clone(clock),
            spans: Mutex::new(Vec::new()),
            work,
        })
    }

    fn earliest_start(&self) -> u64 {
        self.spans.lock().unwrap().iter().map(|s| s.0).min().unwrap()
    }

    fn latest_end(&self) -> u64 {
        self.spans.lock().unwrap().iter().map(|s| s.1).max().unwrap()
    }

    fn invocations(&self) -> usize {
        self.spans.lock().unwrap().len()
    }
}

impl Runnable for TimedRunnable {
    fn run_task(&self, _index: usize, _total: usize) {
        let start = self.clock.tick();
        if !self.work.is_zero() {
            thread::sleep(self.work);
        }
        let end = self.clock.tick();
        self.spans.lock().unwrap().push((start, end));
    }
}

#[test]
fn example_two_chained_batches() {
    let system = SleepingTaskSystem::new(4);
    let clock = Arc::new(Clock::default());
    let r1 = TimedRunnable::new(&clock, Duration::from_millis(2));
    let r2 = TimedRunnable::new(&clock, Duration::ZERO);

    let first = system.run_async_with_deps(r1.clone(), 4, &[]).unwrap();
    let second = system.run_async_with_deps(r2.clone(), 4, &[first]).unwrap();
    assert_eq!(first, BatchId(0));
    assert_eq!(second, BatchId(1));

    system.sync();

    assert_eq!(r1.invocations() + r2.invocations(), 8);
    assert!(r1.latest_end() < r2.earliest_start());
}

#[test]
fn batch_waits_for_all_of_its_dependencies() {
    let system = SleepingTaskSystem::new(4);
    let clock = Arc::new(Clock::default());
    let a = TimedRunnable::new(&clock, Duration::from_millis(3));
    let b = TimedRunnable::new(&clock, Duration::from_millis(1));
    let c = TimedRunnable::new(&clock, Duration::ZERO);

    let id_a = system.run_async(a.clone(), 8).unwrap();
    let id_b = system.run_async(b.clone(), 16).unwrap();
    system.run_async_with_deps(c.clone(), 8, &[id_a, id_b]).unwrap();
    system.sync();

    assert_eq!(c.invocations(), 8);
    assert!(a.latest_end().max(b.latest_end()) < c.earliest_start());
}

#[test]
fn diamond_graph_respects_every_edge() {
    //   top
    //  /   \
    // left right
    //  \   /
    //  bottom
    let system = SleepingTaskSystem::new(3);
    let clock = Arc::new(Clock::default());
    let top = TimedRunnable::new(&clock, Duration::from_millis(1));
    let left = TimedRunnable::new(&clock, Duration::ZERO);
    let right = TimedRunnable::new(&clock, Duration::from_millis(1));
    let bottom = TimedRunnable::new(&clock, Duration::ZERO);

    let id_top = system.run_async(top.clone(), 5).unwrap();
    let id_left = system.run_async_with_deps(left.clone(), 5, &[id_top]).unwrap();
    let id_right = system.run_async_with_deps(right.clone(), 5, &[id_top]).unwrap();
    system
        .run_async_with_deps(bottom.clone(), 5, &[id_left, id_right])
        .unwrap();
    system.sync();

    assert!(top.latest_end() < left.earliest_start());
    assert!(top.latest_end() < right.earliest_start());
    assert!(left.latest_end().max(right.latest_end()) < bottom.earliest_start());
}

#[test]
fn sync_covers_only_its_own_round() {
    let system = SleepingTaskSystem::new(2);
    let counter = Arc::new(AtomicUsize::new(0));
    let runnable: Arc<dyn Runnable> = {
        let counter = Arc::clone(&counter);
        Arc::new(move |_: usize, _: usize| {
            thread::sleep(Duration::from_micros(200));
            counter.fetch_add(1, Ordering::SeqCst);
        })
    };

    let first = system.run_async(runnable.clone(), 20).unwrap();
    system.sync();
    assert_eq!(counter.load(Ordering::SeqCst), 20);

    // Work submitted after the first barrier is not reported done by it.
    system.run_async_with_deps(runnable.clone(), 20, &[first]).unwrap();
    system.run_async(runnable.clone(), 20).unwrap();
    system.sync();
    assert_eq!(counter.load(Ordering::SeqCst), 60);
    assert_eq!(system.scheduler().outstanding(), 0);
}

#[test]
fn deferred_batch_submitted_while_dependency_is_running() {
    let system = SleepingTaskSystem::new(2);
    let gate = Arc::new(Mutex::new(()));
    let order = Arc::new(Mutex::new(Vec::new()));

    let held = gate.lock().unwrap();
    let slow: Arc<dyn Runnable> = {
        let gate = Arc::clone(&gate);
        let order = Arc::clone(&order);
        Arc::new(move |_: usize, _: usize| {
            drop(gate.lock().unwrap());
            order.lock().unwrap().push("slow");
        })
    };
    let fast: Arc<dyn Runnable> = {
        let order = Arc::clone(&order);
        Arc::new(move |_: usize, _: usize| order.lock().unwrap().push("fast"))
    };

    let slow_id = system.run_async(slow, 2).unwrap();
    system.run_async_with_deps(fast, 3, &[slow_id]).unwrap();
    thread::sleep(Duration::from_millis(10));
    assert!(order.lock().unwrap().is_empty());

    drop(held);
    system.sync();
    assert_eq!(
        *order.lock().unwrap(),
        vec!["slow", "slow", "fast", "fast", "fast"]
    );
}

#[test]
fn ids_remain_usable_as_dependencies_after_sync() {
    let system = SleepingTaskSystem::new(2);
    let counter = Arc::new(AtomicUsize::new(0));
    let runnable: Arc<dyn Runnable> = {
        let counter = Arc::clone(&counter);
        Arc::new(move |_: usize, _: usize| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    };

    let old = system.run_async(runnable.clone(), 3).unwrap();
    system.sync();
    let new = system
        .run_async_with_deps(runnable.clone(), 3, &[old])
        .unwrap();
    assert!(new > old);
    system.sync();
    assert_eq!(counter.load(Ordering::SeqCst), 6);
}

#[test]
fn wide_fan_in_from_many_threads() {
    let system = Arc::new(SleepingTaskSystem::new(4));
    let counter = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let system = Arc::clone(&system);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                system
                    .run_async(
                        Arc::new(move |_: usize, _: usize| {
                            counter.fetch_add(1, Ordering::SeqCst);
                        }),
                        25,
                    )
                    .unwrap()
            })
        })
        .collect();
    let roots: Vec<BatchId> = submitters
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let sink = Arc::clone(&counter);
    system
        .run_async_with_deps(
            Arc::new(move |_: usize, _: usize| {
                sink.fetch_add(1000, Ordering::SeqCst);
            }),
            1,
            &roots,
        )
        .unwrap();
    system.sync();

    assert_eq!(counter.load(Ordering::SeqCst), 8 * 25 + 1000);
    assert_eq!(system.metrics().unwrap().batches_completed, 9);
}
