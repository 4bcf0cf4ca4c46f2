// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Pipeline coordinator
//!
//! Drives stages in declared order. Tasks of a stage all read the same
//! snapshot of upstream outputs; the run-wide output map is only written after
//! every task of the stage has finished.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::lifecycle::{TaskLifecycle, TaskReport};
use crate::pipeline::{Pipeline, Stage};
use crate::policy::{HookChain, PolicyEngine, PolicyHook};
use crate::tasks::{OutputMap, Payload, TaskContext, TaskRegistry};

/// Caller-supplied context for a run
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// Outputs already available before the first stage
    pub upstream_outputs: OutputMap,
    /// Read-only state visible to every task and merged into gate contexts
    pub pipeline_state: Payload,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(mut self, state: Payload) -> Self {
        self.pipeline_state = state;
        self
    }

    pub fn with_upstream(mut self, outputs: OutputMap) -> Self {
        self.upstream_outputs = outputs;
        self
    }
}

/// Outcome of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Per-stage record of a run
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: String,
    pub status: StageStatus,
    pub required: bool,
    pub parallel: bool,
    pub tasks: Vec<TaskReport>,
    pub duration: Duration,
}

impl StageReport {
    fn skipped(stage: &Stage) -> Self {
        Self {
            name: stage.name().to_string(),
            status: StageStatus::Skipped,
            required: stage.is_required(),
            parallel: stage.is_parallel(),
            tasks: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Reports of tasks that ran and failed; tasks never started are excluded
    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.failure.is_some())
    }
}

/// Aggregate result of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub pipeline: String,
    /// False iff a required stage failed
    pub success: bool,
    pub stages_completed: Vec<String>,
    pub stages_failed: Vec<String>,
    /// Stages not executed after a required failure
    pub stages_skipped: Vec<String>,
    /// Task name to output, successful tasks only
    pub outputs: OutputMap,
    pub stage_reports: Vec<StageReport>,
    pub duration: Duration,
    /// Description of the required failure that halted the run
    pub error: Option<String>,
}

impl PipelineResult {
    fn new(pipeline: &str) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            success: true,
            stages_completed: Vec::new(),
            stages_failed: Vec::new(),
            stages_skipped: Vec::new(),
            outputs: BTreeMap::new(),
            stage_reports: Vec::new(),
            duration: Duration::ZERO,
            error: None,
        }
    }

    pub fn total_stages(&self) -> usize {
        self.stages_completed.len() + self.stages_failed.len() + self.stages_skipped.len()
    }

    pub fn output(&self, task: &str) -> Option<&Value> {
        self.outputs.get(task)
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stage_reports.iter().find(|s| s.name == name)
    }

    /// Every task that ran and failed, across all stages
    pub fn failed_tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.stage_reports.iter().flat_map(|s| s.failed_tasks())
    }
}

/// Runs a pipeline under a policy engine and hook chain
pub struct PipelineCoordinator {
    pipeline: Pipeline,
    registry: Arc<dyn TaskRegistry>,
    engine: Option<PolicyEngine>,
    hooks: HookChain,
    max_concurrency: Option<usize>,
}

impl PipelineCoordinator {
    pub fn new(pipeline: Pipeline, registry: Arc<dyn TaskRegistry>) -> Self {
        Self {
            pipeline,
            registry,
            engine: None,
            hooks: HookChain::new(),
            max_concurrency: None,
        }
    }

    /// Evaluate gates before and after every task
    pub fn with_policy_engine(mut self, engine: PolicyEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Append a hook; hooks run in registration order
    pub fn with_hook(mut self, hook: Box<dyn PolicyHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn with_hooks(mut self, hooks: HookChain) -> Self {
        self.hooks = hooks;
        self
    }

    /// Cap the number of tasks a parallel stage runs at once
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> &dyn TaskRegistry {
        self.registry.as_ref()
    }

    pub fn policy_engine(&self) -> Option<&PolicyEngine> {
        self.engine.as_ref()
    }

    /// Execute every stage in order
    pub async fn run(&self, initial_input: Payload, context: ExecutionContext) -> PipelineResult {
        let start = Instant::now();
        let mut result = PipelineResult::new(self.pipeline.name());
        let state = Arc::new(context.pipeline_state);
        let mut shared = context.upstream_outputs;

        tracing::info!(
            pipeline = %self.pipeline.name(),
            stages = self.pipeline.stages().len(),
            "starting pipeline"
        );

        for stage in self.pipeline.stages() {
            if result.error.is_some() {
                tracing::debug!(stage = %stage.name(), "skipping stage");
                result.stages_skipped.push(stage.name().to_string());
                result.stage_reports.push(StageReport::skipped(stage));
                continue;
            }

            let report = self
                .execute_stage(stage, &initial_input, &shared, &state)
                .await;

            for task in &report.tasks {
                if let Some(output) = &task.output {
                    shared.insert(task.task.clone(), output.clone());
                    result.outputs.insert(task.task.clone(), output.clone());
                }
            }

            match report.status {
                StageStatus::Failed => {
                    result.stages_failed.push(stage.name().to_string());
                    if stage.is_required() {
                        tracing::error!(
                            stage = %stage.name(),
                            "required stage failed, halting pipeline"
                        );
                        result.success = false;
                        result.error = Some(describe_failure(&report));
                    } else {
                        tracing::warn!(stage = %stage.name(), "optional stage failed, continuing");
                    }
                }
                _ => {
                    tracing::info!(stage = %stage.name(), "stage completed");
                    result.stages_completed.push(stage.name().to_string());
                }
            }

            result.stage_reports.push(report);
        }

        result.duration = start.elapsed();
        tracing::info!(
            pipeline = %self.pipeline.name(),
            success = result.success,
            completed = result.stages_completed.len(),
            failed = result.stages_failed.len(),
            skipped = result.stages_skipped.len(),
            "pipeline finished"
        );
        result
    }

    async fn execute_stage(
        &self,
        stage: &Stage,
        input: &Payload,
        shared: &OutputMap,
        state: &Arc<Payload>,
    ) -> StageReport {
        let start = Instant::now();
        tracing::info!(
            stage = %stage.name(),
            tasks = stage.task_names().len(),
            parallel = stage.is_parallel(),
            "executing stage"
        );

        let tasks = if stage.is_parallel() && stage.task_names().len() > 1 {
            self.execute_parallel(stage, input, shared, state).await
        } else {
            if stage.is_parallel() {
                tracing::warn!(
                    stage = %stage.name(),
                    "parallel stage has a single task, running directly"
                );
            }
            self.execute_sequential(stage, input, shared, state).await
        };

        let status = if tasks.iter().all(TaskReport::succeeded) {
            StageStatus::Completed
        } else {
            StageStatus::Failed
        };

        StageReport {
            name: stage.name().to_string(),
            status,
            required: stage.is_required(),
            parallel: stage.is_parallel(),
            tasks,
            duration: start.elapsed(),
        }
    }

    async fn execute_parallel(
        &self,
        stage: &Stage,
        input: &Payload,
        shared: &OutputMap,
        state: &Arc<Payload>,
    ) -> Vec<TaskReport> {
        let snapshot = TaskContext::new(Arc::new(shared.clone()), state.clone());
        let limit = self.max_concurrency.unwrap_or(stage.task_names().len());

        // Futures are built up front so the stream holds no borrowing closure
        let pending: Vec<_> = stage
            .task_names()
            .iter()
            .map(|name| self.execute_task(name, input.clone(), &snapshot))
            .collect();

        stream::iter(pending).buffered(limit).collect().await
    }

    async fn execute_sequential(
        &self,
        stage: &Stage,
        input: &Payload,
        shared: &OutputMap,
        state: &Arc<Payload>,
    ) -> Vec<TaskReport> {
        let mut local = shared.clone();
        let mut reports = Vec::with_capacity(stage.task_names().len());
        let mut names = stage.task_names().iter();

        for name in names.by_ref() {
            let context = TaskContext::new(Arc::new(local.clone()), state.clone());
            let report = self.execute_task(name, input.clone(), &context).await;
            let failed = !report.succeeded();
            if let Some(output) = &report.output {
                local.insert(name.clone(), output.clone());
            }
            reports.push(report);
            if failed {
                break;
            }
        }

        // The first failure ends a sequential stage; later tasks never start
        for name in names {
            tracing::debug!(stage = %stage.name(), task = %name, "task not started");
            reports.push(TaskReport::not_started(name));
        }

        reports
    }

    async fn execute_task(&self, name: &str, input: Payload, context: &TaskContext) -> TaskReport {
        TaskLifecycle::new(name, self.registry.as_ref(), self.engine.as_ref(), &self.hooks)
            .run(input, context)
            .await
    }
}

fn describe_failure(report: &StageReport) -> String {
    let details: Vec<String> = report
        .failed_tasks()
        .filter_map(|t| {
            t.failure
                .as_ref()
                .map(|failure| format!("task '{}': {}", t.task, failure))
        })
        .collect();
    format!("Stage '{}' failed: {}", report.name, details.join("; "))
}
