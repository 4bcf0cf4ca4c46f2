// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Terminal color utilities
//!
//! Consistent symbols and colors for stage, task and policy output.

use colored::{ColoredString, Colorize};

use crate::pipeline::{StageStatus, TaskState};
use crate::policy::{EnvironmentTier, Severity};

/// Check if colors should be disabled
pub fn should_use_colors() -> bool {
    // Respect NO_COLOR environment variable
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::env::var_os("TERM").is_some()
}

/// Apply the color preference globally
pub fn configure() {
    colored::control::set_override(should_use_colors());
}

pub fn stage_symbol(status: StageStatus) -> ColoredString {
    match status {
        StageStatus::Completed => "✓".green(),
        StageStatus::Failed => "✗".red(),
        StageStatus::Skipped => "○".dimmed(),
    }
}

pub fn task_symbol(state: TaskState) -> ColoredString {
    match state {
        TaskState::Completed => "✓".green(),
        TaskState::Blocked | TaskState::GatedOut => "⊘".yellow(),
        TaskState::Failed => "✗".red(),
        TaskState::Pending | TaskState::Executing => "·".dimmed(),
    }
}

/// ALLOW / DENY label for a policy decision
pub fn decision_label(allowed: bool) -> ColoredString {
    if allowed {
        "ALLOW".green().bold()
    } else {
        "DENY".red().bold()
    }
}

pub fn tier_label(tier: EnvironmentTier) -> ColoredString {
    match tier {
        EnvironmentTier::Development => tier.as_str().blue(),
        EnvironmentTier::Test => tier.as_str().yellow(),
        EnvironmentTier::Production => tier.as_str().red().bold(),
    }
}

pub fn severity_label(severity: Severity) -> ColoredString {
    let text = severity.to_string();
    match severity {
        Severity::Info => text.blue(),
        Severity::Warning => text.yellow(),
        Severity::Error => text.red(),
    }
}

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.len().max(40)));
}

/// Print a styled section
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

pub fn print_info(msg: &str) {
    println!("  {} {}", "→".blue(), msg);
}
