use clap::Parser;

/// Drive a counting workload through the task systems.
///
/// Every sub-task index is checked to have run exactly once, and the
/// aggregate is compared against the serial result.
#[derive(Parser, Debug)]
#[command(name = "tasksys", version, about = "Run a counting workload through the task systems")]
pub struct CliArgs {
    /// Strategy: serial, spawn, spinning, sleeping, or all
    #[arg(long, default_value = "all")]
    pub strategy: String,

    /// Worker threads (0 = available parallelism; overrides the config file)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Sub-tasks per batch
    #[arg(long, default_value_t = 1024)]
    pub tasks: usize,

    /// Number of batches to submit
    #[arg(long, default_value_t = 8)]
    pub batches: usize,

    /// Make each batch depend on the previous one
    #[arg(long)]
    pub chain: bool,

    /// Path to a TOML config file
    #[arg(long, env = "TASKSYS_CONFIG")]
    pub config: Option<String>,

    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,
}
