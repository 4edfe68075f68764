//! Shipyard CLI
//!
//! Runs a multi-target pipeline definition locally, validates definitions,
//! and evaluates the deployment gate for a branch or tag.
//!
//! Exit status: 0 when the run finishes, 1 when it aborts, 2 when the
//! definition or configuration is rejected before any phase starts.

mod commands;
mod definition;
mod output;

use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shipyard")]
#[command(about = "Multi-target build/test/deploy orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays machine readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipyard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match handle_command(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}
