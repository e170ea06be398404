use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tasksys_compute::{BatchId, Runnable, TaskSysMetrics, TaskSystem};

/// Counts how often each index ran and folds `index * weight` into a sum.
struct CountingRunnable {
    weight: u64,
    hits: Vec<AtomicU32>,
    sum: Arc<AtomicU64>,
}

impl CountingRunnable {
    fn new(weight: u64, total: usize, sum: &Arc<AtomicU64>) -> Self {
        Self {
            weight,
            hits: (0..total).map(|_| AtomicU32::new(0)).collect(),
            sum: Arc::clone(sum),
        }
    }

    /// Indices that did not run exactly once.
    fn misses(&self) -> usize {
        self.hits
            .iter()
            .filter(|hits| hits.load(Ordering::Relaxed) != 1)
            .count()
    }
}

impl Runnable for CountingRunnable {
    fn run_task(&self, index: usize, _total: usize) {
        self.hits[index].fetch_add(1, Ordering::Relaxed);
        self.sum
            .fetch_add((index as u64).wrapping_mul(self.weight), Ordering::Relaxed);
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Outcome of one workload run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub system: &'static str,
    pub batches: usize,
    pub tasks_per_batch: usize,
    pub chained: bool,
    pub elapsed_ms: f64,
    pub checksum: u64,
    pub expected_checksum: u64,
    pub bad_indices: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TaskSysMetrics>,
}

impl Report {
    pub fn is_valid(&self) -> bool {
        self.bad_indices == 0 && self.checksum == self.expected_checksum
    }
}

/// Sum of `index * weight` over all batches, computed directly. Arithmetic
/// wraps modulo 2^64, matching the atomic accumulator.
fn expected_checksum(batches: usize, tasks: usize) -> u64 {
    let n = tasks as u64;
    let m = n.saturating_sub(1);
    // n * (n - 1) / 2 with the halving applied to whichever factor is even
    let per_weight = if n % 2 == 0 {
        (n / 2).wrapping_mul(m)
    } else {
        n.wrapping_mul(m / 2)
    };
    (1..=batches as u64).fold(0u64, |acc, weight| {
        acc.wrapping_add(weight.wrapping_mul(per_weight))
    })
}

/// Submit `batches` counting batches through `system` and validate them.
pub fn run(system: &dyn TaskSystem, batches: usize, tasks: usize, chain: bool) -> Result<Report> {
    let sum = Arc::new(AtomicU64::new(0));
    let runnables: Vec<Arc<CountingRunnable>> = (1..=batches as u64)
        .map(|weight| Arc::new(CountingRunnable::new(weight, tasks, &sum)))
        .collect();

    let started = Instant::now();
    if system.supports_async() {
        let mut previous: Option<BatchId> = None;
        for runnable in &runnables {
            let deps: Vec<BatchId> = if chain { previous.into_iter().collect() } else { Vec::new() };
            previous = Some(system.run_async_with_deps(runnable.clone(), tasks, &deps)?);
        }
        system.sync();
    } else {
        // Back-to-back synchronous runs already respect any chain order.
        for runnable in &runnables {
            system.run(runnable.clone(), tasks);
        }
    }
    let elapsed = started.elapsed();

    Ok(Report {
        system: system.name(),
        batches,
        tasks_per_batch: tasks,
        chained: chain,
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        checksum: sum.load(Ordering::Relaxed),
        expected_checksum: expected_checksum(batches, tasks),
        bad_indices: runnables.iter().map(|r| r.misses()).sum(),
        metrics: system.metrics(),
    })
}
