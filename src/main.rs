// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! govflow - Governed pipeline runner
//!
//! Run multi-stage task pipelines behind tiered policy gates and hooks.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use govflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "govflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    govflow::utils::configure();
    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            pipeline,
            tier,
            format,
        } => govflow::cli::run::run(pipeline, tier, format, cli.verbose).await,
        Commands::Validate { pipeline } => {
            govflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Gates => govflow::cli::gates::run(cli.verbose).await,
        Commands::Check {
            context,
            tier,
            phase,
            gates,
            format,
        } => govflow::cli::check::run(context, tier, phase, gates, format).await,
    }
}
