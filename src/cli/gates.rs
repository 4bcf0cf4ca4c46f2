// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Gates command - list the built-in gates

use colored::Colorize;
use miette::Result;

use crate::policy::{builtin_gate, tier_gates, EnvironmentTier};
use crate::utils;

/// Run the gates command
pub async fn run(verbose: bool) -> Result<()> {
    utils::print_header("Built-in gates");

    for name in crate::policy::builtin_gate_names() {
        let gate = builtin_gate(name)?;
        println!("  {:<22} {}", gate.name().cyan(), gate.description());
    }

    if verbose {
        utils::print_section("Default gates per tier");
        for tier in [
            EnvironmentTier::Development,
            EnvironmentTier::Test,
            EnvironmentTier::Production,
        ] {
            let names: Vec<String> = tier_gates(tier)
                .iter()
                .map(|g| g.name().to_string())
                .collect();
            let restrictions = tier.restrictions();
            println!(
                "  {:<12} {} {}",
                utils::tier_label(tier),
                names.join(", "),
                format!(
                    "(approval: {}, max concurrent: {})",
                    restrictions.requires_approval, restrictions.max_concurrent_tasks
                )
                .dimmed()
            );
        }
    }

    Ok(())
}
