// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Check command - evaluate gates against a JSON context

use colored::Colorize;
use miette::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::{OutputFormat, PhaseArg};
use crate::errors::GovflowError;
use crate::policy::{custom_gates, EnvironmentTier, GateContext, PolicyEngine};
use crate::utils;

/// Task name recorded in decisions made by this command
const CHECK_TASK: &str = "check";

/// Run the check command
pub async fn run(
    context_path: PathBuf,
    tier: Option<String>,
    phase: PhaseArg,
    gates: Vec<String>,
    format: OutputFormat,
) -> Result<()> {
    let context = load_context(&context_path)?;
    let tier = tier
        .as_deref()
        .map(EnvironmentTier::detect)
        .unwrap_or_default();

    let engine = if gates.is_empty() {
        PolicyEngine::for_tier(tier)
    } else {
        PolicyEngine::new(custom_gates(&gates)?, tier)
    };

    let decision = engine.evaluate(CHECK_TASK, phase.0, &context).await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&decision)
                .map_err(|e| miette::miette!("Failed to serialize decision: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!(
                "{} ({} tier, {}, {} gates)",
                utils::decision_label(decision.allowed),
                utils::tier_label(tier),
                phase.0,
                decision.gates_evaluated()
            );
            for gate in &decision.gates_passed {
                utils::print_success(gate);
            }
            for violation in &decision.violations {
                utils::print_error(&format!("{}: {}", violation.gate, violation.message));
                println!("      {} {}", "→".blue(), violation.remediation);
            }
        }
    }

    if decision.allowed {
        Ok(())
    } else {
        Err(miette::miette!("Policy denied: {}", decision.summary()))
    }
}

fn load_context(path: &Path) -> Result<GateContext, GovflowError> {
    let content = std::fs::read_to_string(path).map_err(|e| GovflowError::FileReadError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    match serde_json::from_str::<Value>(&content)? {
        Value::Object(map) => Ok(map),
        other => Err(GovflowError::invalid_config(
            format!("gate context must be a JSON object, got {}", kind(&other)),
            "Wrap the values in an object, e.g. {\"tests_passed\": true}",
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
