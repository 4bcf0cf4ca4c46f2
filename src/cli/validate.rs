// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::config::ProjectConfig;
use crate::pipeline::PipelineValidator;
use crate::utils;

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    // Load configuration
    let config = match ProjectConfig::from_file(&pipeline_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("  {} Failed to load pipeline", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    println!("  {} Pipeline file parsed", "✓".green());

    // Structural checks happen while building
    let pipeline = config.build_pipeline()?;
    println!("  {} Stage structure is valid", "✓".green());

    let registry = config.build_registry(&crate::config::base_dir(&pipeline_path))?;
    let tier = config.resolve_tier(None);
    let engine = config.build_policy_engine(tier)?;
    config.build_hooks()?;
    println!("  {} Policy and hooks are valid", "✓".green());

    let validation = PipelineValidator::validate(&pipeline, &registry);
    let missing_shells = config.missing_shells();

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            utils::print_error(error);
        }
    }

    if !missing_shells.is_empty() {
        println!();
        println!("{}:", "Missing shells".yellow().bold());
        for shell in &missing_shells {
            utils::print_warning(shell);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            utils::print_warning(warning);
        }
    }

    if verbose {
        utils::print_section("Pipeline summary");
        utils::print_info(&format!("Name: {}", pipeline.name()));
        utils::print_info(&format!("Tier: {}", tier));
        match engine {
            Some(ref engine) => {
                utils::print_info(&format!("Gates: {}", engine.gate_names().join(", ")))
            }
            None => utils::print_info(&format!("Gates: {}", "none".dimmed())),
        }
        utils::print_info(&format!("Stages: {}", pipeline.stages().len()));
        for stage in pipeline.stages() {
            let mut flags = Vec::new();
            if stage.is_parallel() {
                flags.push("parallel");
            }
            if !stage.is_required() {
                flags.push("optional");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!(
                "    - {} ({}){}",
                stage.name(),
                stage.task_names().join(", "),
                flags.dimmed()
            );
        }
    }

    println!();

    if !validation.is_valid() {
        Err(miette::miette!("Pipeline validation failed"))
    } else if validation.has_warnings() || !missing_shells.is_empty() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}
