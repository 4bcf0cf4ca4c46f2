// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Policy evaluation
//!
//! Gates, tier semantics, the policy engine and lifecycle hooks.

mod engine;
mod gates;
mod hooks;
mod tier;

pub use engine::{Phase, PolicyDecision, PolicyEngine, PolicyViolation, GATE_ERROR_REMEDIATION};
pub use gates::{
    builtin_gate, builtin_gate_names, ApprovalGate, BranchPolicyGate, CodeQualityGate,
    DocumentationGate, FileVerificationGate, Gate, GateContext, GateResult,
    SecurityValidationGate, Severity, TestSuccessGate,
};
pub use hooks::{
    AuditLoggingHook, CostTrackingHook, DataSanitizationHook, HookChain, HookVeto, PolicyHook,
    PostHookDecision, PreHookDecision, RateLimitHook,
};
pub use tier::{
    base_remediation, custom_gates, decide, minimal_gates, quality_gates, remediate,
    security_gates, tier_gates, EnvironmentTier, TierRestrictions,
};
