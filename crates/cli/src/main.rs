mod cli;
mod workload;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use jobweave_scheduler::{JobSystem, PoolId, SchedulerConfig, SchedulerMetrics};

use crate::cli::{CheckConfigArgs, CliArgs, Command, RunArgs};
use crate::workload::RunSummary;

fn main() -> Result<()> {
    // Load .env file (silently ignores if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    match args.command {
        Command::Run(run) => run_workload(run),
        Command::CheckConfig(check) => check_config(check),
    }
}

/// Config from `path`, or the built-in defaults with env overrides applied.
fn load_config(path: Option<&Path>) -> Result<SchedulerConfig> {
    match path {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let mut config = SchedulerConfig::default();
            config.apply_env_overrides();
            config.validate().context("invalid configuration from environment")?;
            Ok(config)
        }
    }
}

#[derive(Serialize)]
struct RunReport {
    summary: RunSummary,
    metrics: SchedulerMetrics,
}

fn run_workload(args: RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let system = JobSystem::new(config).context("failed to start job system")?;

    let summary = workload::run(&system, args.jobs, args.chain)?;
    let metrics = system.metrics();
    system.shutdown();

    if args.json {
        let report = RunReport { summary, metrics };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "fan-out: {}/{} jobs, chain: {} links -> {}, elapsed {:?}",
        summary.fan_out_counted,
        summary.fan_out_jobs,
        summary.chain_length,
        summary.chain_result,
        summary.elapsed
    );
    for (pool, m) in &metrics.pools {
        println!(
            "  {:<10} threads={:<3} completed={:<6} failed={:<3} panicked={:<3} discarded={:<3} avg={:?}",
            pool.as_str(),
            m.threads,
            m.jobs_completed,
            m.jobs_failed,
            m.jobs_panicked,
            m.jobs_discarded,
            m.avg_job_duration
        );
    }
    Ok(())
}

fn check_config(args: CheckConfigArgs) -> Result<()> {
    let config = load_config(Some(args.config.as_path()))?;
    info!(path = %args.config.display(), "configuration is valid");

    println!(
        "watchdog: {} (every {:?}), rescan interval {:?}",
        if config.watchdog_enabled { "enabled" } else { "disabled" },
        config.watchdog_interval(),
        config.rescan_interval()
    );
    for pool in PoolId::ALL {
        let settings = config.pool_settings(pool);
        println!(
            "  {:<10} threads={:<3} cores={:?}",
            pool.as_str(),
            settings.threads,
            settings.cores
        );
    }
    Ok(())
}
