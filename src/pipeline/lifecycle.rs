// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Per-task lifecycle
//!
//! Every task goes through five steps: pre-hooks, pre-gates, execution,
//! post-gates, post-hooks. The first step that does not allow ends the
//! lifecycle; nothing after it runs.
//!
//! ```text
//! pending ──► executing ──► completed
//!    │            │
//!    ├──► blocked ◄┤   (hook block / reject)
//!    ├──► gated-out ◄┤ (policy denial)
//!    └──► failed ◄───┘ (unknown task / execution error)
//! ```

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::errors::panic_message;
use crate::policy::{GateContext, HookChain, Phase, PolicyDecision, PolicyEngine};
use crate::tasks::{Payload, TaskContext, TaskRegistry};

/// State of a task within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Pending,
    Blocked,
    Executing,
    GatedOut,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Blocked | Self::GatedOut | Self::Completed | Self::Failed
        )
    }

    /// Legal moves of the lifecycle
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Executing)
                | (Pending, Blocked)
                | (Pending, GatedOut)
                | (Pending, Failed)
                | (Executing, Completed)
                | (Executing, Blocked)
                | (Executing, GatedOut)
                | (Executing, Failed)
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Blocked => "blocked",
            Self::Executing => "executing",
            Self::GatedOut => "gated-out",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why a task did not complete
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    #[error("Task '{task}' not found in registry")]
    NotFound { task: String },

    #[error("Blocked by hook '{hook}': {reason}")]
    HookBlocked { hook: String, reason: String },

    #[error("Output rejected by hook '{hook}': {reason}")]
    HookRejected { hook: String, reason: String },

    #[error("{phase} policy check failed: {}", decision.summary())]
    PolicyDenied {
        phase: Phase,
        decision: PolicyDecision,
    },

    #[error("Execution failed: {error}")]
    ExecutionFailed { error: String },
}

/// Everything recorded about one task in one run
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task: String,
    pub state: TaskState,
    /// Present only when the task completed
    pub output: Option<Value>,
    pub failure: Option<TaskFailure>,
    pub pre_decision: Option<PolicyDecision>,
    pub post_decision: Option<PolicyDecision>,
    pub duration: Duration,
}

impl TaskReport {
    /// Report for a task that was never started
    pub fn not_started(task: &str) -> Self {
        Self {
            task: task.to_string(),
            state: TaskState::Pending,
            output: None,
            failure: None,
            pre_decision: None,
            post_decision: None,
            duration: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == TaskState::Completed
    }
}

enum Step {
    PreHooks(Payload),
    PreGates(Payload),
    Execute(Payload),
    PostGates(Value),
    PostHooks(Value),
}

/// Drives one task through its lifecycle
pub struct TaskLifecycle<'a> {
    task_name: &'a str,
    registry: &'a dyn TaskRegistry,
    engine: Option<&'a PolicyEngine>,
    hooks: &'a HookChain,
    report: TaskReport,
}

impl<'a> TaskLifecycle<'a> {
    pub fn new(
        task_name: &'a str,
        registry: &'a dyn TaskRegistry,
        engine: Option<&'a PolicyEngine>,
        hooks: &'a HookChain,
    ) -> Self {
        Self {
            task_name,
            registry,
            engine,
            hooks,
            report: TaskReport::not_started(task_name),
        }
    }

    pub fn state(&self) -> TaskState {
        self.report.state
    }

    fn transition(&mut self, next: TaskState) {
        debug_assert!(
            self.report.state.can_transition_to(next),
            "illegal task transition {} -> {}",
            self.report.state,
            next
        );
        tracing::debug!(
            task = %self.task_name,
            from = %self.report.state,
            to = %next,
            "task transition"
        );
        self.report.state = next;
    }

    fn finish(mut self, state: TaskState, failure: TaskFailure) -> TaskReport {
        tracing::warn!(task = %self.task_name, state = %state, %failure, "task did not complete");
        self.transition(state);
        self.report.failure = Some(failure);
        self.report
    }

    /// Run the whole lifecycle
    pub async fn run(mut self, input: Payload, context: &TaskContext) -> TaskReport {
        let start = Instant::now();
        tracing::debug!(task = %self.task_name, "executing task");

        let Some(task) = self.registry.resolve(self.task_name) else {
            let failure = TaskFailure::NotFound {
                task: self.task_name.to_string(),
            };
            return self.finish(TaskState::Failed, failure).timed(start);
        };

        let mut step = Step::PreHooks(input);
        loop {
            step = match step {
                Step::PreHooks(input) => {
                    match self.hooks.before(self.task_name, input, context).await {
                        Ok(input) => Step::PreGates(input),
                        Err(veto) => {
                            let failure = TaskFailure::HookBlocked {
                                hook: veto.hook,
                                reason: veto.reason,
                            };
                            return self.finish(TaskState::Blocked, failure).timed(start);
                        }
                    }
                }
                Step::PreGates(input) => {
                    if let Some(engine) = self.engine {
                        let gate_context = merge_context(context.pipeline_state(), &input);
                        let decision = engine.evaluate_pre(self.task_name, &gate_context).await;
                        self.report.pre_decision = Some(decision.clone());
                        if !decision.allowed {
                            let failure = TaskFailure::PolicyDenied {
                                phase: Phase::PreExecution,
                                decision,
                            };
                            return self.finish(TaskState::GatedOut, failure).timed(start);
                        }
                    }
                    Step::Execute(input)
                }
                Step::Execute(input) => {
                    self.transition(TaskState::Executing);
                    let outcome = AssertUnwindSafe(task.execute(input, context))
                        .catch_unwind()
                        .await;
                    match outcome {
                        Ok(Ok(output)) => Step::PostGates(output),
                        Ok(Err(e)) => {
                            let failure = TaskFailure::ExecutionFailed {
                                error: format!("{:#}", e),
                            };
                            return self.finish(TaskState::Failed, failure).timed(start);
                        }
                        Err(panic) => {
                            let failure = TaskFailure::ExecutionFailed {
                                error: format!("task panicked: {}", panic_message(panic.as_ref())),
                            };
                            return self.finish(TaskState::Failed, failure).timed(start);
                        }
                    }
                }
                Step::PostGates(output) => {
                    if let Some(engine) = self.engine {
                        let gate_context = output_context(context.pipeline_state(), &output);
                        let decision = engine.evaluate_post(self.task_name, &gate_context).await;
                        self.report.post_decision = Some(decision.clone());
                        if !decision.allowed {
                            let failure = TaskFailure::PolicyDenied {
                                phase: Phase::PostExecution,
                                decision,
                            };
                            return self.finish(TaskState::GatedOut, failure).timed(start);
                        }
                    }
                    Step::PostHooks(output)
                }
                Step::PostHooks(output) => {
                    if let Err(veto) = self.hooks.after(self.task_name, &output, context).await {
                        let failure = TaskFailure::HookRejected {
                            hook: veto.hook,
                            reason: veto.reason,
                        };
                        return self.finish(TaskState::Blocked, failure).timed(start);
                    }

                    self.transition(TaskState::Completed);
                    self.report.output = Some(output);
                    tracing::debug!(task = %self.task_name, "task completed");
                    return self.report.timed(start);
                }
            };
        }
    }
}

impl TaskReport {
    fn timed(mut self, start: Instant) -> Self {
        self.duration = start.elapsed();
        self
    }
}

/// Pipeline state with the payload's keys on top
fn merge_context(state: &Payload, data: &Payload) -> GateContext {
    let mut context = state.clone();
    for (key, value) in data {
        context.insert(key.clone(), value.clone());
    }
    context
}

fn output_context(state: &Payload, output: &Value) -> GateContext {
    match output {
        Value::Object(map) => merge_context(state, map),
        other => {
            let mut context = state.clone();
            context.insert("output".into(), other.clone());
            context
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{
        custom_gates, EnvironmentTier, PolicyHook, PostHookDecision, PreHookDecision,
    };
    use crate::tasks::{InMemoryRegistry, StaticTask, Task};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct Marked {
        ran: Arc<AtomicBool>,
        output: Value,
    }

    #[async_trait]
    impl Task for Marked {
        async fn execute(&self, _input: Payload, _context: &TaskContext) -> anyhow::Result<Value> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Task for Failing {
        async fn execute(&self, _input: Payload, _context: &TaskContext) -> anyhow::Result<Value> {
            Err(anyhow::anyhow!("disk full")).map_err(|e| e.context("writing report"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Task for Panicking {
        async fn execute(&self, _input: Payload, _context: &TaskContext) -> anyhow::Result<Value> {
            panic!("index out of range")
        }
    }

    struct Veto {
        block_before: bool,
    }

    #[async_trait]
    impl PolicyHook for Veto {
        fn name(&self) -> &str {
            "veto"
        }

        async fn before_execute(&self, _: &str, _: &Payload, _: &TaskContext) -> PreHookDecision {
            if self.block_before {
                PreHookDecision::Block { reason: "frozen".into() }
            } else {
                PreHookDecision::Allow
            }
        }

        async fn after_execute(&self, _: &str, _: &Value, _: &TaskContext) -> PostHookDecision {
            PostHookDecision::Reject { reason: "unsigned".into() }
        }
    }

    fn marked(output: Value) -> (InMemoryRegistry, Arc<AtomicBool>) {
        let ran = Arc::new(AtomicBool::new(false));
        let mut registry = InMemoryRegistry::new();
        registry
            .register("job", Marked { ran: ran.clone(), output })
            .unwrap();
        (registry, ran)
    }

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected object"),
        }
    }

    #[test]
    fn test_transitions() {
        assert!(TaskState::Pending.can_transition_to(TaskState::Executing));
        assert!(TaskState::Executing.can_transition_to(TaskState::GatedOut));
        assert!(!TaskState::Pending.can_transition_to(TaskState::Completed));
        assert!(!TaskState::Completed.can_transition_to(TaskState::Failed));
        assert!(TaskState::Blocked.is_terminal());
        assert!(!TaskState::Executing.is_terminal());
    }

    #[tokio::test]
    async fn test_completes_without_policy() {
        let (registry, ran) = marked(json!({"ok": true}));
        let hooks = HookChain::new();

        let lifecycle = TaskLifecycle::new("job", &registry, None, &hooks);
        assert_eq!(lifecycle.state(), TaskState::Pending);
        let report = lifecycle.run(Payload::new(), &TaskContext::default()).await;

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(report.state, TaskState::Completed);
        assert_eq!(report.output, Some(json!({"ok": true})));
        assert!(report.failure.is_none());
    }

    #[tokio::test]
    async fn test_blocking_pre_hook_skips_gates_and_body() {
        let (registry, ran) = marked(json!({}));
        let engine = PolicyEngine::for_tier(EnvironmentTier::Test);
        let mut hooks = HookChain::new();
        hooks.push(Box::new(Veto { block_before: true }));

        let report = TaskLifecycle::new("job", &registry, Some(&engine), &hooks)
            .run(Payload::new(), &TaskContext::default())
            .await;

        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(report.state, TaskState::Blocked);
        assert!(report.pre_decision.is_none());
        assert!(report.post_decision.is_none());
        assert_eq!(
            report.failure,
            Some(TaskFailure::HookBlocked {
                hook: "veto".into(),
                reason: "frozen".into()
            })
        );
    }

    #[tokio::test]
    async fn test_pre_gate_denial_skips_body() {
        let (registry, ran) = marked(json!({}));
        let engine =
            PolicyEngine::new(custom_gates(&["approval"]).unwrap(), EnvironmentTier::Production);
        let hooks = HookChain::new();

        let report = TaskLifecycle::new("job", &registry, Some(&engine), &hooks)
            .run(payload(json!({"approval_granted": false})), &TaskContext::default())
            .await;

        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(report.state, TaskState::GatedOut);
        assert!(matches!(
            report.failure,
            Some(TaskFailure::PolicyDenied { phase: Phase::PreExecution, .. })
        ));
        assert!(report.post_decision.is_none());
    }

    #[tokio::test]
    async fn test_pre_gates_read_pipeline_state() {
        let (registry, ran) = marked(json!({}));
        let engine =
            PolicyEngine::new(custom_gates(&["branch-policy"]).unwrap(), EnvironmentTier::Test);
        let hooks = HookChain::new();
        let state = payload(json!({"current_branch": "main", "allowed_branches": ["main"]}));
        let context = TaskContext::new(Default::default(), Arc::new(state));

        let report = TaskLifecycle::new("job", &registry, Some(&engine), &hooks)
            .run(Payload::new(), &context)
            .await;

        assert!(ran.load(Ordering::SeqCst));
        assert!(report.pre_decision.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_post_gate_denial_withholds_output() {
        let (registry, ran) = marked(json!({"security_scan_passed": false}));
        let engine = PolicyEngine::new(
            custom_gates(&["security-validation"]).unwrap(),
            EnvironmentTier::Test,
        );
        let hooks = HookChain::new();

        let report = TaskLifecycle::new("job", &registry, Some(&engine), &hooks)
            .run(payload(json!({"security_scan_passed": true})), &TaskContext::default())
            .await;

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(report.state, TaskState::GatedOut);
        assert!(report.pre_decision.unwrap().allowed);
        assert!(!report.post_decision.unwrap().allowed);
        assert!(report.output.is_none());
    }

    #[tokio::test]
    async fn test_post_hook_rejection_after_side_effects() {
        let (registry, ran) = marked(json!({}));
        let mut hooks = HookChain::new();
        hooks.push(Box::new(Veto { block_before: false }));

        let report = TaskLifecycle::new("job", &registry, None, &hooks)
            .run(Payload::new(), &TaskContext::default())
            .await;

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(report.state, TaskState::Blocked);
        assert!(report.output.is_none());
        assert!(matches!(report.failure, Some(TaskFailure::HookRejected { .. })));
    }

    #[tokio::test]
    async fn test_unknown_task_fails() {
        let registry = InMemoryRegistry::new();
        let hooks = HookChain::new();

        let report = TaskLifecycle::new("ghost", &registry, None, &hooks)
            .run(Payload::new(), &TaskContext::default())
            .await;

        assert_eq!(report.state, TaskState::Failed);
        assert_eq!(
            report.failure,
            Some(TaskFailure::NotFound { task: "ghost".into() })
        );
    }

    #[tokio::test]
    async fn test_execution_error_keeps_cause_chain() {
        let mut registry = InMemoryRegistry::new();
        registry.register("job", Failing).unwrap();
        let hooks = HookChain::new();

        let report = TaskLifecycle::new("job", &registry, None, &hooks)
            .run(Payload::new(), &TaskContext::default())
            .await;

        assert_eq!(report.state, TaskState::Failed);
        match report.failure {
            Some(TaskFailure::ExecutionFailed { error }) => {
                assert_eq!(error, "writing report: disk full");
            }
            other => panic!("Expected ExecutionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let mut registry = InMemoryRegistry::new();
        registry.register("job", Panicking).unwrap();
        registry.register("other", StaticTask::new(json!(1))).unwrap();
        let hooks = HookChain::new();

        let report = TaskLifecycle::new("job", &registry, None, &hooks)
            .run(Payload::new(), &TaskContext::default())
            .await;

        assert_eq!(report.state, TaskState::Failed);
        assert!(report
            .failure
            .unwrap()
            .to_string()
            .contains("index out of range"));
    }
}
