// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Pipeline validation
//!
//! Structural checks run once when stages and pipelines are built, plus an
//! advisory report used before a run.

use std::collections::HashSet;

use crate::errors::GovflowError;
use crate::pipeline::{Pipeline, Stage};
use crate::tasks::TaskRegistry;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// A stage needs at least one task
    pub fn check_stage(stage: &Stage) -> Result<(), GovflowError> {
        if stage.task_names().is_empty() {
            return Err(GovflowError::EmptyStage {
                stage: stage.name().to_string(),
            });
        }
        Ok(())
    }

    /// A pipeline needs at least one stage and unique stage names
    pub fn check_structure(pipeline: &str, stages: &[Stage]) -> Result<(), GovflowError> {
        if stages.is_empty() {
            return Err(GovflowError::EmptyPipeline {
                pipeline: pipeline.to_string(),
            });
        }

        let mut seen = HashSet::new();
        for stage in stages {
            if !seen.insert(stage.name()) {
                return Err(GovflowError::DuplicateStage {
                    pipeline: pipeline.to_string(),
                    stage: stage.name().to_string(),
                });
            }
        }

        Ok(())
    }

    /// Check a built pipeline against a registry
    pub fn validate(pipeline: &Pipeline, registry: &dyn TaskRegistry) -> ValidationResult {
        let mut result = ValidationResult::new();

        for task in pipeline.missing_tasks(registry) {
            result.add_error(&format!("Unknown task: '{}'", task));
        }

        let mut seen_tasks = HashSet::new();
        for stage in pipeline.stages() {
            if stage.is_parallel() && stage.task_names().len() == 1 {
                result.add_warning(&format!(
                    "Stage '{}': marked as parallel but only has one task",
                    stage.name()
                ));
            }

            for task in stage.task_names() {
                if !seen_tasks.insert(task.as_str()) {
                    result.add_warning(&format!(
                        "Stage '{}': task '{}' already ran earlier; its output will be replaced",
                        stage.name(),
                        task
                    ));
                }
            }
        }

        result
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
