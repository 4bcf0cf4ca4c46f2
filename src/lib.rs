// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! # govflow - Governed pipeline runner
//!
//! `govflow` runs named tasks in ordered stages. Every task is wrapped by
//! hooks and checked by policy gates before and after it executes; how strictly
//! gate failures are enforced depends on the environment tier.
//!
//! ## Features
//!
//! - **Policy gates** - Pass/fail checks over a structured context
//! - **Environment tiers** - Development warns, test and production block
//! - **Hooks** - Rewrite input, veto execution or withhold output
//! - **Stages** - Sequential or parallel, required or optional
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a pipeline file
//! govflow validate .govflow.yaml
//!
//! # Run it under production policy
//! govflow run --tier production
//!
//! # Evaluate gates against a context
//! govflow check context.json --gates test-success,approval
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod policy;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use config::ProjectConfig;
pub use errors::{GovflowError, GovflowResult};
pub use pipeline::{
    ExecutionContext, Pipeline, PipelineCoordinator, PipelineResult, Stage, TaskFailure,
    TaskState,
};
pub use policy::{EnvironmentTier, Gate, PolicyDecision, PolicyEngine, PolicyHook};
pub use tasks::{InMemoryRegistry, Task, TaskContext, TaskRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
