mod cli;
mod workload;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use tasksys_compute::build_task_system;
use tasksys_core::{load_dotenv, Strategy, TaskSysConfig};

use crate::cli::CliArgs;
use crate::workload::Report;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => TaskSysConfig::from_file(path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => TaskSysConfig::from_env().context("invalid TASKSYS_* environment")?,
    };
    if let Some(threads) = args.threads {
        config.worker_threads = threads;
    }

    let strategies: Vec<Strategy> = if args.strategy.eq_ignore_ascii_case("all") {
        Strategy::ALL.to_vec()
    } else {
        vec![args.strategy.parse().context("invalid --strategy")?]
    };

    let mut reports = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        config.strategy = strategy;
        let system = build_task_system(&config);
        let report = workload::run(system.as_ref(), args.batches, args.tasks, args.chain)
            .with_context(|| format!("{strategy} workload failed"))?;
        info!("{}: {:.3} ms", report.system, report.elapsed_ms);
        reports.push(report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_table(&reports);
    }

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| !r.is_valid())
        .map(|r| r.system)
        .collect();
    if !failed.is_empty() {
        warn!("Validation failed for: {}", failed.join(", "));
        bail!("{} task system(s) produced wrong results", failed.len());
    }
    Ok(())
}

fn print_table(reports: &[Report]) {
    println!(
        "{:<32} {:>8} {:>8} {:>12} {:>6}",
        "system", "batches", "tasks", "elapsed ms", "ok"
    );
    for report in reports {
        println!(
            "{:<32} {:>8} {:>8} {:>12.3} {:>6}",
            report.system,
            report.batches,
            report.tasks_per_batch,
            report.elapsed_ms,
            if report.is_valid() { "yes" } else { "NO" }
        );
    }
}
