// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Policy engine
//!
//! Runs a fixed gate list against a context before and after a task
//! executes and folds the results into a [`PolicyDecision`].

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;

use super::gates::{Gate, GateContext, GateResult, Severity};
use super::tier::{decide, remediate, tier_gates, EnvironmentTier};
use crate::errors::panic_message;

/// Remediation for a gate that panicked instead of returning a result
pub const GATE_ERROR_REMEDIATION: &str = "Check gate configuration and context data";

/// Which side of task execution an evaluation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    PreExecution,
    PostExecution,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreExecution => "pre-execution",
            Self::PostExecution => "post-execution",
        }
    }

    /// Context key the evaluated payload is nested under
    fn payload_key(&self) -> &'static str {
        match self {
            Self::PreExecution => "input",
            Self::PostExecution => "output",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed gate with tier-adjusted guidance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub gate: String,
    pub severity: Severity,
    pub message: String,
    pub remediation: String,
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.gate, self.message)
    }
}

/// Aggregate outcome of one evaluation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub gates_passed: Vec<String>,
    pub gates_failed: Vec<String>,
    /// One entry per failed gate, in the same order as `gates_failed`
    pub violations: Vec<PolicyViolation>,
}

impl PolicyDecision {
    /// Number of gates that were evaluated
    pub fn gates_evaluated(&self) -> usize {
        self.gates_passed.len() + self.gates_failed.len()
    }

    /// One-line summary of the violations
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.gate, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Stateless evaluator over a fixed gate list and tier
pub struct PolicyEngine {
    gates: Vec<Box<dyn Gate>>,
    tier: EnvironmentTier,
}

impl PolicyEngine {
    /// Create an engine with an explicit gate list
    pub fn new(gates: Vec<Box<dyn Gate>>, tier: EnvironmentTier) -> Self {
        tracing::info!(gates = gates.len(), tier = %tier, "initialized policy engine");
        Self { gates, tier }
    }

    /// Create an engine with the default gates for a tier
    pub fn for_tier(tier: EnvironmentTier) -> Self {
        Self::new(tier_gates(tier), tier)
    }

    pub fn tier(&self) -> EnvironmentTier {
        self.tier
    }

    pub fn gate_names(&self) -> Vec<&str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Evaluate every gate before a task runs
    pub async fn evaluate_pre(&self, task_name: &str, context: &GateContext) -> PolicyDecision {
        tracing::info!(task = %task_name, "pre-execution policy evaluation");
        self.evaluate(task_name, Phase::PreExecution, context).await
    }

    /// Evaluate every gate after a task produced output
    pub async fn evaluate_post(&self, task_name: &str, context: &GateContext) -> PolicyDecision {
        tracing::info!(task = %task_name, "post-execution policy evaluation");
        self.evaluate(task_name, Phase::PostExecution, context).await
    }

    /// Evaluate for an explicit phase
    pub async fn evaluate(
        &self,
        task_name: &str,
        phase: Phase,
        context: &GateContext,
    ) -> PolicyDecision {
        let context = self.build_context(task_name, phase, context);

        let mut results = Vec::with_capacity(self.gates.len());
        for gate in &self.gates {
            let result = match AssertUnwindSafe(gate.evaluate(&context)).catch_unwind().await {
                Ok(result) => GateOutcome::Evaluated(result),
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    tracing::error!(gate = %gate.name(), %reason, "gate evaluation panicked");
                    GateOutcome::Errored(GateResult::fail(
                        gate.name(),
                        format!("Gate evaluation error: {}", reason),
                    ))
                }
            };
            tracing::debug!(
                gate = %gate.name(),
                passed = result.as_ref().passed,
                message = %result.as_ref().message,
                "gate evaluated"
            );
            results.push(result);
        }

        self.aggregate(task_name, results)
    }

    /// Engine metadata first, caller keys on top
    fn build_context(&self, task_name: &str, phase: Phase, supplied: &GateContext) -> GateContext {
        let mut context = GateContext::new();
        context.insert("task_name".into(), Value::String(task_name.to_string()));
        context.insert("tier".into(), Value::String(self.tier.to_string()));
        context.insert("phase".into(), Value::String(phase.to_string()));
        context.insert(phase.payload_key().into(), Value::Object(supplied.clone()));
        for (key, value) in supplied {
            context.insert(key.clone(), value.clone());
        }
        context
    }

    fn aggregate(&self, task_name: &str, outcomes: Vec<GateOutcome>) -> PolicyDecision {
        let results: Vec<GateResult> = outcomes.iter().map(|o| o.as_ref().clone()).collect();
        let allowed = decide(self.tier, &results);

        let mut gates_passed = Vec::new();
        let mut gates_failed = Vec::new();
        let mut violations = Vec::new();

        for outcome in &outcomes {
            let result = outcome.as_ref();
            if result.passed {
                gates_passed.push(result.gate_name.clone());
                continue;
            }
            let remediation = match outcome {
                GateOutcome::Evaluated(result) => remediate(self.tier, result),
                GateOutcome::Errored(_) => GATE_ERROR_REMEDIATION.to_string(),
            };
            gates_failed.push(result.gate_name.clone());
            violations.push(PolicyViolation {
                gate: result.gate_name.clone(),
                severity: result.severity,
                message: result.message.clone(),
                remediation,
            });
        }

        if !gates_failed.is_empty() {
            let failed = gates_failed.len();
            match self.tier {
                EnvironmentTier::Development => tracing::warn!(
                    task = %task_name,
                    failed,
                    "development tier: gates failed (proceeding)"
                ),
                EnvironmentTier::Test => tracing::warn!(
                    task = %task_name,
                    failed,
                    "test tier: gates failed (blocking)"
                ),
                EnvironmentTier::Production => tracing::error!(
                    task = %task_name,
                    failed,
                    "production tier: gates failed (blocking)"
                ),
            }
        }

        let verdict = if allowed { "ALLOW" } else { "DENY" };
        tracing::info!(
            task = %task_name,
            decision = verdict,
            passed = gates_passed.len(),
            failed = gates_failed.len(),
            "policy decision"
        );

        PolicyDecision {
            allowed,
            gates_passed,
            gates_failed,
            violations,
        }
    }
}

/// A gate result, or the failure recorded for a gate that panicked
enum GateOutcome {
    Evaluated(GateResult),
    Errored(GateResult),
}

impl AsRef<GateResult> for GateOutcome {
    fn as_ref(&self) -> &GateResult {
        match self {
            Self::Evaluated(result) | Self::Errored(result) => result,
        }
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("tier", &self.tier)
            .field("gates", &self.gate_names())
            .finish()
    }
}
