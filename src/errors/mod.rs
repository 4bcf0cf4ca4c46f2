// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Error types
//!
//! Only construction-time and I/O problems surface as [`GovflowError`].
//! Failures of individual tasks during a run are captured as
//! [`TaskFailure`](crate::pipeline::TaskFailure) values and reported through
//! the pipeline result instead.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for govflow operations
pub type GovflowResult<T> = Result<T, GovflowError>;

/// Main error type for govflow
#[derive(Error, Debug, Diagnostic)]
pub enum GovflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Structural Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline '{pipeline}' must have at least one stage")]
    #[diagnostic(
        code(govflow::empty_pipeline),
        help("Add a `stages:` list with at least one stage")
    )]
    EmptyPipeline { pipeline: String },

    #[error("Pipeline '{pipeline}' has duplicate stage name '{stage}'")]
    #[diagnostic(
        code(govflow::duplicate_stage),
        help("Stage names must be unique within a pipeline")
    )]
    DuplicateStage { pipeline: String, stage: String },

    #[error("Stage '{stage}' must have at least one task")]
    #[diagnostic(code(govflow::empty_stage))]
    EmptyStage { stage: String },

    #[error("Unknown gate: {gate}")]
    #[diagnostic(code(govflow::unknown_gate), help("Available gates: {available}"))]
    UnknownGate { gate: String, available: String },

    #[error("Task '{task}' is already registered")]
    #[diagnostic(code(govflow::duplicate_task))]
    DuplicateTask { task: String },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(govflow::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(govflow::config_not_found),
        help("Create a .govflow.yaml describing your tasks and stages")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(govflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/Parsing Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(govflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(govflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(govflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(govflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for GovflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for GovflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for GovflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for GovflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl GovflowError {
    /// Whether this error describes an invalid pipeline, stage, policy or
    /// registry definition (as opposed to a file or parsing problem).
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyPipeline { .. }
                | Self::DuplicateStage { .. }
                | Self::EmptyStage { .. }
                | Self::UnknownGate { .. }
                | Self::DuplicateTask { .. }
                | Self::InvalidConfig { .. }
        )
    }

    /// Create an unknown gate error listing the gates that do exist
    pub fn unknown_gate(gate: &str, available: &[&str]) -> Self {
        Self::UnknownGate {
            gate: gate.to_string(),
            available: available.join(", "),
        }
    }

    /// Create an invalid configuration error with a hint
    pub fn invalid_config(reason: impl Into<String>, help: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
            help: Some(help.into()),
        }
    }
}

/// Text carried by a caught panic payload
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_class() {
        let err = GovflowError::EmptyStage {
            stage: "build".into(),
        };
        assert!(err.is_configuration_error());

        let err = GovflowError::Io {
            message: "boom".into(),
        };
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn test_unknown_gate_lists_available() {
        let err = GovflowError::unknown_gate("nope", &["approval", "documentation"]);
        match err {
            GovflowError::UnknownGate { gate, available } => {
                assert_eq!(gate, "nope");
                assert_eq!(available, "approval, documentation");
            }
            _ => panic!("Expected UnknownGate"),
        }
    }

    #[test]
    fn test_panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static text");
        assert_eq!(panic_message(payload.as_ref()), "static text");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned text"));
        assert_eq!(panic_message(payload.as_ref()), "owned text");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
