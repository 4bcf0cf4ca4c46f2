// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for govflow.

pub mod check;
pub mod gates;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::policy::Phase;

/// Governed pipeline runner
///
/// Run multi-stage task pipelines behind policy gates and hooks.
#[derive(Parser, Debug)]
#[clap(
    name = "govflow",
    version,
    about = "Run task pipelines behind tiered policy gates and hooks",
    long_about = None,
    after_help = "Examples:\n\
        govflow run                          Run .govflow.yaml\n\
        govflow run --tier production        Enforce production policy\n\
        govflow validate ci/flow.toml        Check a pipeline file\n\
        govflow check ctx.json --phase post  Evaluate gates against a context\n\n\
        See 'govflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline
    Run {
        /// Pipeline file
        #[clap(short, long, default_value = ".govflow.yaml")]
        pipeline: PathBuf,

        /// Environment tier (development, test, production)
        #[clap(short, long, env = "GOVFLOW_ENV")]
        tier: Option<String>,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = ".govflow.yaml")]
        pipeline: PathBuf,
    },

    /// List the built-in gates
    Gates,

    /// Evaluate gates against a JSON context
    Check {
        /// JSON file holding the gate context object
        context: PathBuf,

        /// Environment tier (development, test, production)
        #[clap(short, long, env = "GOVFLOW_ENV")]
        tier: Option<String>,

        /// Evaluation phase
        #[clap(long, default_value = "pre")]
        phase: PhaseArg,

        /// Comma-separated gate names (default: the tier's gate set)
        #[clap(short, long, value_delimiter = ',')]
        gates: Vec<String>,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for run and check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Phase selector for the check command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseArg(pub Phase);

impl std::str::FromStr for PhaseArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre" | "pre-execution" => Ok(Self(Phase::PreExecution)),
            "post" | "post-execution" => Ok(Self(Phase::PostExecution)),
            _ => Err(format!("Unknown phase: {}", s)),
        }
    }
}
