use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TaskSysError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

// ── Strategy ──────────────────────────────────────────────────

/// Which scheduler runs the sub-tasks. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Every sub-task in index order on the calling thread.
    Serial,
    /// Fresh threads per `run`, one contiguous index range each.
    Spawn,
    /// Persistent pool whose idle workers busy-poll the queue.
    Spinning,
    /// Persistent pool whose idle workers sleep, plus dependency scheduling.
    Sleeping,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Serial,
        Strategy::Spawn,
        Strategy::Spinning,
        Strategy::Sleeping,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Serial => "serial",
            Strategy::Spawn => "spawn",
            Strategy::Spinning => "spinning",
            Strategy::Sleeping => "sleeping",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = TaskSysError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(Strategy::Serial),
            "spawn" => Ok(Strategy::Spawn),
            "spinning" | "spin" => Ok(Strategy::Spinning),
            "sleeping" | "sleep" => Ok(Strategy::Sleeping),
            other => Err(TaskSysError::Config(format!(
                "unknown strategy '{other}', expected serial, spawn, spinning or sleeping"
            ))),
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Task system configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSysConfig {
    /// Scheduling strategy.
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

fn default_strategy() -> Strategy {
    Strategy::Sleeping
}

fn default_worker_threads() -> usize {
    0
}

impl Default for TaskSysConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            worker_threads: default_worker_threads(),
        }
    }
}

impl TaskSysConfig {
    pub fn new(strategy: Strategy, worker_threads: usize) -> Self {
        Self {
            strategy,
            worker_threads,
        }
    }

    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, TaskSysError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TaskSysError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus environment overrides (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, TaskSysError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// - `TASKSYS_STRATEGY` → `strategy`
    /// - `TASKSYS_WORKER_THREADS` → `worker_threads`
    fn apply_env_overrides(&mut self) -> Result<(), TaskSysError> {
        if let Some(v) = env_opt("TASKSYS_STRATEGY") {
            self.strategy = v.parse()?;
        }
        if let Some(v) = env_opt("TASKSYS_WORKER_THREADS") {
            self.worker_threads = v.parse().map_err(|_| {
                TaskSysError::Config(format!("TASKSYS_WORKER_THREADS is not a count: '{v}'"))
            })?;
        }
        Ok(())
    }

    /// Resolve worker thread count: 0 means available parallelism, and
    /// anything above the hardware concurrency is clamped to it.
    pub fn resolved_worker_threads(&self) -> usize {
        resolve_worker_threads(self.worker_threads)
    }
}

/// Hardware concurrency, or 4 when it cannot be determined.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Clamp a requested thread count into `1..=available_parallelism()`.
pub fn resolve_worker_threads(requested: usize) -> usize {
    let available = available_parallelism();
    match requested {
        0 => available,
        n if n > available => {
            debug!("Clamping {} requested worker threads to {}", n, available);
            available
        }
        n => n,
    }
}
