// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::{base_dir, ProjectConfig};
use crate::pipeline::{
    ExecutionContext, PipelineResult, PipelineValidator, StageReport, TaskFailure,
};
use crate::policy::EnvironmentTier;
use crate::utils;

/// Run the pipeline
pub async fn run(
    pipeline_path: PathBuf,
    tier: Option<String>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let config = ProjectConfig::from_file(&pipeline_path)?;
    let tier = config.resolve_tier(tier.as_deref());
    let coordinator = config.build_coordinator(tier, &base_dir(&pipeline_path))?;

    // Validate pipeline
    let validation = PipelineValidator::validate(coordinator.pipeline(), coordinator.registry());

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(miette::miette!("Pipeline configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    let missing_shells = config.missing_shells();
    if !missing_shells.is_empty() {
        eprintln!("{}", "Missing required shells:".red().bold());
        for shell in &missing_shells {
            eprintln!("  {} {}", "✗".red(), shell);
        }
        return Err(miette::miette!("Required shells are not installed"));
    }

    let spinner = utils::create_spinner(
        &format!("Running pipeline '{}'...", coordinator.pipeline().name()),
        format == OutputFormat::Text && utils::should_use_colors(),
    );

    let context = ExecutionContext::new().with_state(config.state.clone());
    let result = coordinator.run(config.input.clone(), context).await;
    spinner.finish_and_clear();

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| miette::miette!("Failed to serialize result: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Text => print_result(&result, tier, verbose),
    }

    if result.success {
        Ok(())
    } else {
        Err(miette::miette!(
            "{}",
            result
                .error
                .unwrap_or_else(|| "Pipeline execution failed".to_string())
        ))
    }
}

fn print_result(result: &PipelineResult, tier: EnvironmentTier, verbose: bool) {
    utils::print_header(&format!("Pipeline '{}'", result.pipeline));
    println!("Tier: {}", utils::tier_label(tier));
    println!();

    for stage in &result.stage_reports {
        print_stage(stage, verbose);
    }

    if !result.outputs.is_empty() {
        utils::print_section("Outputs");
        for (task, output) in &result.outputs {
            if verbose {
                println!("  - {}: {}", task, output);
            } else {
                println!("  - {}", task);
            }
        }
    }

    println!();
    let summary = format!(
        "{} completed, {} failed, {} skipped in {:.2?}",
        result.stages_completed.len(),
        result.stages_failed.len(),
        result.stages_skipped.len(),
        result.duration
    );
    if result.success {
        println!("{} {}", "Pipeline succeeded:".green().bold(), summary);
    } else {
        println!("{} {}", "Pipeline failed:".red().bold(), summary);
    }
}

fn print_stage(stage: &StageReport, verbose: bool) {
    let mut line = format!("  {} {}", utils::stage_symbol(stage.status), stage.name.bold());
    if stage.parallel {
        line.push_str(&format!(" {}", "(parallel)".dimmed()));
    }
    if !stage.required {
        line.push_str(&format!(" {}", "(optional)".dimmed()));
    }
    if stage.tasks.is_empty() {
        line.push_str(&format!(" {}", stage.status.to_string().dimmed()));
    }
    println!("{}", line);

    for task in &stage.tasks {
        if task.succeeded() && !verbose {
            continue;
        }

        println!(
            "      {} {} {}",
            utils::task_symbol(task.state),
            task.task,
            format!("({}, {:.2?})", task.state, task.duration).dimmed()
        );

        match &task.failure {
            Some(TaskFailure::PolicyDenied { phase, decision }) => {
                println!("          {} policy denied", phase);
                for violation in &decision.violations {
                    println!(
                        "          - [{}] {}: {}",
                        utils::severity_label(violation.severity),
                        violation.gate,
                        violation.message
                    );
                    println!("            {} {}", "→".blue(), violation.remediation);
                }
            }
            Some(failure) => println!("          {}", failure.to_string().dimmed()),
            None => {}
        }
    }
}
