// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Environment tiers
//!
//! The tier decides two independent things: whether failed gates block
//! ([`decide`]) and how remediation guidance is worded ([`remediate`]).
//! `development` differs from the others in admission; `test` and
//! `production` differ only in wording and log severity.

use serde::{Deserialize, Serialize};

use super::gates::{
    builtin_gate, ApprovalGate, BranchPolicyGate, CodeQualityGate, DocumentationGate,
    FileVerificationGate, Gate, GateResult, SecurityValidationGate, TestSuccessGate,
};
use crate::errors::GovflowError;

/// Deployment environment tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentTier {
    #[default]
    Development,
    Test,
    Production,
}

impl EnvironmentTier {
    /// Parse a tier name, falling back to `development` for anything unknown
    pub fn detect(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    /// Operational restrictions for this tier
    pub fn restrictions(&self) -> TierRestrictions {
        match self {
            Self::Development => TierRestrictions {
                requires_approval: false,
                max_concurrent_tasks: 10,
            },
            Self::Test => TierRestrictions {
                requires_approval: true,
                max_concurrent_tasks: 5,
            },
            Self::Production => TierRestrictions {
                requires_approval: true,
                max_concurrent_tasks: 3,
            },
        }
    }
}

impl std::fmt::Display for EnvironmentTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnvironmentTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("Unknown environment tier: {}", s)),
        }
    }
}

/// Operational limits attached to a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRestrictions {
    pub requires_approval: bool,
    pub max_concurrent_tasks: usize,
}

/// Admission rule: may work proceed given these gate results?
pub fn decide(tier: EnvironmentTier, results: &[GateResult]) -> bool {
    match tier {
        EnvironmentTier::Development => true,
        EnvironmentTier::Test | EnvironmentTier::Production => results.iter().all(|r| r.passed),
    }
}

/// Fixed guidance for a gate, before any tier wording is added
pub fn base_remediation(gate_name: &str) -> String {
    match gate_name {
        "test-success" => "Run tests locally and fix failures before retrying".to_string(),
        "file-verification" => {
            "Ensure all required files are present and have correct checksums".to_string()
        }
        "branch-policy" => "Switch to an allowed branch for this environment".to_string(),
        "documentation" => "Update documentation to reflect your changes".to_string(),
        "code-quality" => "Run linting and type checking tools, fix reported issues".to_string(),
        "security-validation" => {
            "Review security scan results and remediate vulnerabilities".to_string()
        }
        "approval" => "Request approval from authorized personnel before proceeding".to_string(),
        other => format!("Review {} requirements and retry", other),
    }
}

/// Tier-adjusted remediation text for a gate result
pub fn remediate(tier: EnvironmentTier, result: &GateResult) -> String {
    let base = base_remediation(&result.gate_name);
    match tier {
        EnvironmentTier::Development => base,
        EnvironmentTier::Test => {
            format!("{}. Approval may be required in test environment.", base)
        }
        EnvironmentTier::Production => format!("{}. Production requires strict compliance.", base),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gate presets
// ─────────────────────────────────────────────────────────────────────────────

/// Gates appropriate for a tier.
///
/// Development omits the approval gate; test and production run all seven.
pub fn tier_gates(tier: EnvironmentTier) -> Vec<Box<dyn Gate>> {
    let mut gates: Vec<Box<dyn Gate>> = vec![
        Box::new(TestSuccessGate),
        Box::new(FileVerificationGate),
        Box::new(BranchPolicyGate),
        Box::new(DocumentationGate),
        Box::new(CodeQualityGate),
        Box::new(SecurityValidationGate),
    ];
    if tier != EnvironmentTier::Development {
        gates.push(Box::new(ApprovalGate));
    }
    tracing::debug!(tier = %tier, gates = gates.len(), "loaded tier policy");
    gates
}

/// Tests and security scan only
pub fn minimal_gates() -> Vec<Box<dyn Gate>> {
    vec![Box::new(TestSuccessGate), Box::new(SecurityValidationGate)]
}

/// Tests, code quality and documentation
pub fn quality_gates() -> Vec<Box<dyn Gate>> {
    vec![
        Box::new(TestSuccessGate),
        Box::new(CodeQualityGate),
        Box::new(DocumentationGate),
    ]
}

/// Security scan, file integrity and approval
pub fn security_gates() -> Vec<Box<dyn Gate>> {
    vec![
        Box::new(SecurityValidationGate),
        Box::new(FileVerificationGate),
        Box::new(ApprovalGate),
    ]
}

/// Build a policy from gate identifiers
pub fn custom_gates<S: AsRef<str>>(names: &[S]) -> Result<Vec<Box<dyn Gate>>, GovflowError> {
    names.iter().map(|n| builtin_gate(n.as_ref())).collect()
}
