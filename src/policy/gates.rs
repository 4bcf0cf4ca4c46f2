// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Policy gates
//!
//! A gate is a named, stateless pass/fail check over a [`GateContext`].
//! Gates never fail to evaluate: a missing key is read with a per-gate
//! default, so evaluation is total over any context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::GovflowError;

/// Structured context a gate is evaluated against
pub type GateContext = Map<String, Value>;

/// Severity of a gate outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of evaluating one gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    pub gate_name: String,
    pub message: String,
    pub severity: Severity,
}

impl GateResult {
    /// A passing result (severity `info`)
    pub fn pass(gate_name: &str, message: impl Into<String>) -> Self {
        Self {
            passed: true,
            gate_name: gate_name.to_string(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    /// A failing result (severity `error`)
    pub fn fail(gate_name: &str, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            gate_name: gate_name.to_string(),
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// A single policy check
///
/// Implementations must only read the context keys they recognise and must
/// not depend on other gates, so that evaluation order never changes any
/// individual outcome.
#[async_trait]
pub trait Gate: Send + Sync {
    /// Gate identifier (e.g. `test-success`)
    fn name(&self) -> &str;

    /// Human-readable description of what the gate checks
    fn description(&self) -> &str;

    /// Evaluate the gate against a context
    async fn evaluate(&self, context: &GateContext) -> GateResult;
}

impl std::fmt::Debug for dyn Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate").field("name", &self.name()).finish()
    }
}

/// Only a literal `true` counts as set
fn flag(context: &GateContext, key: &str) -> bool {
    matches!(context.get(key), Some(Value::Bool(true)))
}

fn string_list(context: &GateContext, key: &str) -> Vec<String> {
    match context.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn display_value(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in gates
// ─────────────────────────────────────────────────────────────────────────────

/// All automated tests must pass.
///
/// Keys: `tests_passed` (bool, default false), `test_results.failed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestSuccessGate;

#[async_trait]
impl Gate for TestSuccessGate {
    fn name(&self) -> &str {
        "test-success"
    }

    fn description(&self) -> &str {
        "All automated tests must pass"
    }

    async fn evaluate(&self, context: &GateContext) -> GateResult {
        if flag(context, "tests_passed") {
            return GateResult::pass(self.name(), "All tests passed");
        }

        let failed = display_value(
            context.get("test_results").and_then(|r| r.get("failed")),
            "unknown",
        );
        GateResult::fail(
            self.name(),
            format!("Tests failed (failed count: {})", failed),
        )
    }
}

/// Required files must exist and be intact.
///
/// Keys: `files_verified` (bool, default false), `missing_files`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileVerificationGate;

#[async_trait]
impl Gate for FileVerificationGate {
    fn name(&self) -> &str {
        "file-verification"
    }

    fn description(&self) -> &str {
        "Required files must exist and have correct integrity"
    }

    async fn evaluate(&self, context: &GateContext) -> GateResult {
        if flag(context, "files_verified") {
            return GateResult::pass(self.name(), "All required files verified");
        }

        let missing = string_list(context, "missing_files");
        if missing.is_empty() {
            GateResult::fail(self.name(), "File verification failed")
        } else {
            GateResult::fail(
                self.name(),
                format!("Missing or corrupted files: {}", missing.join(", ")),
            )
        }
    }
}

/// Work must target a branch allowed for the environment.
///
/// Keys: `current_branch` (string, missing fails), `allowed_branches`
/// (exact names or glob patterns such as `release/*`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchPolicyGate;

impl BranchPolicyGate {
    fn branch_allowed(branch: &str, allowed: &[String]) -> bool {
        allowed.iter().any(|entry| {
            entry == branch
                || glob::Pattern::new(entry)
                    .map(|p| p.matches(branch))
                    .unwrap_or(false)
        })
    }
}

#[async_trait]
impl Gate for BranchPolicyGate {
    fn name(&self) -> &str {
        "branch-policy"
    }

    fn description(&self) -> &str {
        "Operations must target correct branch for environment"
    }

    async fn evaluate(&self, context: &GateContext) -> GateResult {
        let branch = match context.get("current_branch") {
            Some(Value::String(s)) if !s.is_empty() => s.as_str(),
            _ => return GateResult::fail(self.name(), "No branch information available"),
        };
        let allowed = string_list(context, "allowed_branches");

        if Self::branch_allowed(branch, &allowed) {
            GateResult::pass(self.name(), format!("Branch '{}' is allowed", branch))
        } else {
            GateResult::fail(
                self.name(),
                format!(
                    "Branch '{}' not in allowed list: [{}]",
                    branch,
                    allowed.join(", ")
                ),
            )
        }
    }
}

/// Changes must ship with documentation.
///
/// Keys: `documentation_updated` (bool, default false),
/// `documentation_score`, `missing_docs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentationGate;

#[async_trait]
impl Gate for DocumentationGate {
    fn name(&self) -> &str {
        "documentation"
    }

    fn description(&self) -> &str {
        "Changes must include appropriate documentation"
    }

    async fn evaluate(&self, context: &GateContext) -> GateResult {
        if flag(context, "documentation_updated") {
            let score = context
                .get("documentation_score")
                .and_then(Value::as_f64)
                .unwrap_or(1.0);
            return GateResult::pass(
                self.name(),
                format!("Documentation updated (score: {:.2})", score),
            );
        }

        let missing = string_list(context, "missing_docs");
        if missing.is_empty() {
            GateResult::fail(self.name(), "Documentation not updated")
        } else {
            GateResult::fail(
                self.name(),
                format!("Missing documentation: {}", missing.join(", ")),
            )
        }
    }
}

/// Linting and type checks must pass.
///
/// Keys: `lint_passed`, `type_check_passed` (both default false),
/// `quality_issues`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeQualityGate;

#[async_trait]
impl Gate for CodeQualityGate {
    fn name(&self) -> &str {
        "code-quality"
    }

    fn description(&self) -> &str {
        "Code must pass linting and type checks"
    }

    async fn evaluate(&self, context: &GateContext) -> GateResult {
        let lint = flag(context, "lint_passed");
        let types = flag(context, "type_check_passed");

        if lint && types {
            return GateResult::pass(self.name(), "Code quality checks passed");
        }

        let mut failed_checks = Vec::new();
        if !lint {
            failed_checks.push("linting");
        }
        if !types {
            failed_checks.push("type checking");
        }
        let issues = string_list(context, "quality_issues").len();

        GateResult::fail(
            self.name(),
            format!(
                "Failed checks: {}. Issues: {}",
                failed_checks.join(", "),
                issues
            ),
        )
    }
}

/// No vulnerabilities or exposed secrets.
///
/// Keys: `security_scan_passed` (bool, default false),
/// `vulnerabilities_found`, `severity_levels`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityValidationGate;

#[async_trait]
impl Gate for SecurityValidationGate {
    fn name(&self) -> &str {
        "security-validation"
    }

    fn description(&self) -> &str {
        "No security vulnerabilities or exposed secrets"
    }

    async fn evaluate(&self, context: &GateContext) -> GateResult {
        if flag(context, "security_scan_passed") {
            return GateResult::pass(self.name(), "Security validation passed");
        }

        let count = context
            .get("vulnerabilities_found")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let levels = display_value(context.get("severity_levels"), "{}");

        GateResult::fail(
            self.name(),
            format!("Found {} vulnerabilities: {}", count, levels),
        )
    }
}

/// Sensitive operations need explicit human approval.
///
/// Keys: `approval_granted` (bool, default false), `approver`,
/// `approval_timestamp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalGate;

#[async_trait]
impl Gate for ApprovalGate {
    fn name(&self) -> &str {
        "approval"
    }

    fn description(&self) -> &str {
        "Human approval required for sensitive operations"
    }

    async fn evaluate(&self, context: &GateContext) -> GateResult {
        if flag(context, "approval_granted") {
            let approver = display_value(context.get("approver"), "unknown");
            let at = display_value(context.get("approval_timestamp"), "unknown");
            return GateResult::pass(self.name(), format!("Approved by {} at {}", approver, at));
        }

        GateResult::fail(self.name(), "Approval required but not granted")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalogue
// ─────────────────────────────────────────────────────────────────────────────

const BUILTIN_GATES: [&str; 7] = [
    "test-success",
    "file-verification",
    "branch-policy",
    "documentation",
    "code-quality",
    "security-validation",
    "approval",
];

/// Identifiers of every built-in gate, in canonical order
pub fn builtin_gate_names() -> &'static [&'static str] {
    &BUILTIN_GATES
}

/// Instantiate a built-in gate by identifier
pub fn builtin_gate(name: &str) -> Result<Box<dyn Gate>, GovflowError> {
    let gate: Box<dyn Gate> = match name {
        "test-success" => Box::new(TestSuccessGate),
        "file-verification" => Box::new(FileVerificationGate),
        "branch-policy" => Box::new(BranchPolicyGate),
        "documentation" => Box::new(DocumentationGate),
        "code-quality" => Box::new(CodeQualityGate),
        "security-validation" => Box::new(SecurityValidationGate),
        "approval" => Box::new(ApprovalGate),
        other => return Err(GovflowError::unknown_gate(other, &BUILTIN_GATES)),
    };
    Ok(gate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> GateContext {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected object"),
        }
    }

    #[tokio::test]
    async fn test_gates_fail_on_empty_context() {
        let empty = GateContext::new();
        for name in builtin_gate_names() {
            let gate = builtin_gate(name).unwrap();
            let result = gate.evaluate(&empty).await;
            assert!(!result.passed, "{} should fail on empty context", name);
            assert_eq!(result.gate_name, *name);
            assert_eq!(result.severity, Severity::Error);
        }
    }

    #[tokio::test]
    async fn test_test_success_gate() {
        let result = TestSuccessGate
            .evaluate(&ctx(json!({"tests_passed": true})))
            .await;
        assert!(result.passed);
        assert_eq!(result.severity, Severity::Info);

        let result = TestSuccessGate
            .evaluate(&ctx(json!({"tests_passed": false, "test_results": {"failed": 3}})))
            .await;
        assert!(!result.passed);
        assert!(result.message.contains("failed count: 3"));
    }

    #[tokio::test]
    async fn test_non_boolean_flag_is_not_truthy() {
        let result = TestSuccessGate
            .evaluate(&ctx(json!({"tests_passed": "yes"})))
            .await;
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_branch_policy_patterns() {
        let gate = BranchPolicyGate;

        let result = gate
            .evaluate(&ctx(json!({
                "current_branch": "release/1.2",
                "allowed_branches": ["main", "release/*"]
            })))
            .await;
        assert!(result.passed);

        let result = gate
            .evaluate(&ctx(json!({
                "current_branch": "feature/x",
                "allowed_branches": ["main"]
            })))
            .await;
        assert!(!result.passed);
        assert!(result.message.contains("feature/x"));

        let result = gate
            .evaluate(&ctx(json!({"allowed_branches": ["main"]})))
            .await;
        assert_eq!(result.message, "No branch information available");
    }

    #[tokio::test]
    async fn test_code_quality_lists_failed_checks() {
        let result = CodeQualityGate
            .evaluate(&ctx(json!({
                "lint_passed": true,
                "quality_issues": ["unused import", "shadowed var"]
            })))
            .await;
        assert!(!result.passed);
        assert_eq!(result.message, "Failed checks: type checking. Issues: 2");
    }

    #[tokio::test]
    async fn test_file_verification_reports_missing() {
        let result = FileVerificationGate
            .evaluate(&ctx(json!({"missing_files": ["a.txt", "b.txt"]})))
            .await;
        assert_eq!(result.message, "Missing or corrupted files: a.txt, b.txt");
    }

    #[tokio::test]
    async fn test_approval_gate_reports_approver() {
        let result = ApprovalGate
            .evaluate(&ctx(json!({
                "approval_granted": true,
                "approver": "ops-lead"
            })))
            .await;
        assert!(result.passed);
        assert_eq!(result.message, "Approved by ops-lead at unknown");
    }

    #[test]
    fn test_unknown_builtin_gate() {
        let err = builtin_gate("lint").unwrap_err();
        assert!(matches!(err, GovflowError::UnknownGate { .. }));
    }
}
