// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Pipeline definition structures
//!
//! Stages and pipelines are validated when they are built and are immutable
//! afterwards.

use serde::Serialize;

use super::validation::PipelineValidator;
use crate::errors::GovflowError;
use crate::tasks::TaskRegistry;

/// A named group of tasks executed together
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    name: String,
    task_names: Vec<String>,
    parallel: bool,
    required: bool,
    description: Option<String>,
}

impl Stage {
    /// Create a sequential, required stage
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        task_names: impl IntoIterator<Item = S>,
    ) -> Result<Self, GovflowError> {
        let stage = Self {
            name: name.into(),
            task_names: task_names.into_iter().map(Into::into).collect(),
            parallel: false,
            required: true,
            description: None,
        };
        PipelineValidator::check_stage(&stage)?;
        Ok(stage)
    }

    /// Run the stage's tasks concurrently
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether a failure of this stage halts the pipeline
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task_names(&self) -> &[String] {
        &self.task_names
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// An ordered sequence of stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Create a pipeline; fails on an empty stage list or duplicate names
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Result<Self, GovflowError> {
        let name = name.into();
        PipelineValidator::check_structure(&name, &stages)?;

        tracing::info!(pipeline = %name, stages = stages.len(), "pipeline initialized");
        Ok(Self { name, stages })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of task references across all stages
    pub fn total_tasks(&self) -> usize {
        self.stages.iter().map(|s| s.task_names.len()).sum()
    }

    /// Referenced task names the registry cannot resolve, in first-use order
    pub fn missing_tasks(&self, registry: &dyn TaskRegistry) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for task in self.stages.iter().flat_map(|s| s.task_names.iter()) {
            if !registry.contains(task) && !missing.contains(task) {
                tracing::warn!(pipeline = %self.name, task = %task, "unknown task referenced");
                missing.push(task.clone());
            }
        }
        missing
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline(name='{}', stages={}, tasks={})",
            self.name,
            self.stages.len(),
            self.total_tasks()
        )
    }
}
