use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Drive and inspect the jobweave job system.
#[derive(Parser, Debug)]
#[command(name = "jobweave", version, about = "Multi-pool dependency-aware job scheduler")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a fan-out and a cross-pool dependency chain, then print metrics.
    Run(RunArgs),
    /// Parse and validate a config file, then print the resolved pools.
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to jobweave.toml. Built-in defaults when omitted.
    #[arg(long, env = "JOBWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Independent counter jobs submitted to the general pool.
    #[arg(long, default_value_t = 1000)]
    pub jobs: usize,

    /// Length of the dependency chain spread across every pool.
    #[arg(long, default_value_t = 16)]
    pub chain: usize,

    /// Print the run summary and metrics as pretty JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Path to jobweave.toml.
    #[arg(long, env = "JOBWEAVE_CONFIG")]
    pub config: PathBuf,
}
