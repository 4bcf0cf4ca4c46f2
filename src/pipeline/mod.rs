// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Pipeline definitions and execution
//!
//! Stages and pipelines, the per-task lifecycle, and the coordinator that
//! runs stages under policy.

mod coordinator;
mod definition;
mod lifecycle;
mod validation;

pub use coordinator::{
    ExecutionContext, PipelineCoordinator, PipelineResult, StageReport, StageStatus,
};
pub use definition::{Pipeline, Stage};
pub use lifecycle::{TaskFailure, TaskLifecycle, TaskReport, TaskState};
pub use validation::{PipelineValidator, ValidationResult};
