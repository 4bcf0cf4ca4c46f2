// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Project configuration
//!
//! A `.govflow.yaml` (or `.toml` / `.json`) file describes the tasks, the
//! stages that run them, the policy applied at each task boundary and the
//! hooks wrapped around every task.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{GovflowError, GovflowResult};
use crate::pipeline::{Pipeline, PipelineCoordinator, Stage};
use crate::policy::{
    custom_gates, minimal_gates, quality_gates, security_gates, tier_gates, AuditLoggingHook,
    CostTrackingHook, DataSanitizationHook, EnvironmentTier, Gate, HookChain, PolicyEngine,
    RateLimitHook,
};
use crate::tasks::{InMemoryRegistry, Payload, ShellTask, StaticTask};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".govflow.yaml";

/// Top-level project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Environment tier; unknown values fall back to development
    #[serde(default)]
    pub tier: Option<String>,

    #[serde(default)]
    pub policy: PolicyConfig,

    /// Hooks, applied in the listed order
    #[serde(default)]
    pub hooks: Vec<HookConfig>,

    #[serde(default)]
    pub tasks: BTreeMap<String, TaskConfig>,

    pub stages: Vec<StageConfig>,

    /// Initial input handed to every task
    #[serde(default)]
    pub input: Payload,

    /// Pipeline state visible to tasks and gates
    #[serde(default)]
    pub state: Payload,
}

/// Which gates guard every task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub preset: PolicyPreset,

    /// Explicit gate list; overrides the preset when non-empty
    #[serde(default)]
    pub gates: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    /// Gate set chosen by the environment tier
    #[default]
    Tier,
    Minimal,
    Quality,
    Security,
    /// No policy engine at all
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookConfig {
    Audit,
    Sanitize {
        #[serde(default)]
        sensitive_keys: Option<Vec<String>>,
    },
    RateLimit {
        max_per_minute: usize,
    },
    CostTracking {
        cost_per_1k_tokens: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskConfig {
    /// Run a command through a shell
    Shell {
        command: String,
        #[serde(default = "default_shell")]
        shell: String,
    },
    /// Return a fixed value
    Static {
        #[serde(default)]
        output: Value,
    },
}

fn default_shell() -> String {
    "bash".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,

    pub tasks: Vec<String>,

    #[serde(default)]
    pub parallel: bool,

    #[serde(default = "default_required")]
    pub required: bool,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_required() -> bool {
    true
}

impl ProjectConfig {
    /// Load from a file, choosing the format by extension
    pub fn from_file(path: &Path) -> GovflowResult<Self> {
        if !path.exists() {
            return Err(GovflowError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| GovflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> GovflowResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn from_toml(content: &str) -> GovflowResult<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    pub fn from_json(content: &str) -> GovflowResult<Self> {
        serde_json::from_str(content).map_err(Into::into)
    }

    /// Tier from an override (flag or environment), then the file
    pub fn resolve_tier(&self, override_tier: Option<&str>) -> EnvironmentTier {
        override_tier
            .or(self.tier.as_deref())
            .map(EnvironmentTier::detect)
            .unwrap_or_default()
    }

    /// Gates for this tier, or `None` when policy is disabled
    pub fn build_gates(&self, tier: EnvironmentTier) -> GovflowResult<Option<Vec<Box<dyn Gate>>>> {
        if !self.policy.gates.is_empty() {
            return custom_gates(&self.policy.gates).map(Some);
        }

        let gates = match self.policy.preset {
            PolicyPreset::Tier => tier_gates(tier),
            PolicyPreset::Minimal => minimal_gates(),
            PolicyPreset::Quality => quality_gates(),
            PolicyPreset::Security => security_gates(),
            PolicyPreset::None => return Ok(None),
        };
        Ok(Some(gates))
    }

    pub fn build_policy_engine(
        &self,
        tier: EnvironmentTier,
    ) -> GovflowResult<Option<PolicyEngine>> {
        Ok(self
            .build_gates(tier)?
            .map(|gates| PolicyEngine::new(gates, tier)))
    }

    pub fn build_hooks(&self) -> GovflowResult<HookChain> {
        let mut chain = HookChain::new();
        for hook in &self.hooks {
            match hook {
                HookConfig::Audit => chain.push(Box::new(AuditLoggingHook)),
                HookConfig::Sanitize { sensitive_keys } => {
                    let hook = match sensitive_keys {
                        Some(keys) => DataSanitizationHook::with_keys(keys.clone()),
                        None => DataSanitizationHook::new(),
                    };
                    chain.push(Box::new(hook));
                }
                HookConfig::RateLimit { max_per_minute } => {
                    if *max_per_minute == 0 {
                        return Err(GovflowError::invalid_config(
                            "rate_limit.max_per_minute must be at least 1",
                            "Remove the hook to disable rate limiting",
                        ));
                    }
                    chain.push(Box::new(RateLimitHook::new(*max_per_minute)));
                }
                HookConfig::CostTracking { cost_per_1k_tokens } => {
                    if !cost_per_1k_tokens.is_finite() || *cost_per_1k_tokens < 0.0 {
                        return Err(GovflowError::invalid_config(
                            format!(
                                "cost_per_1k_tokens must be a non-negative number, got {}",
                                cost_per_1k_tokens
                            ),
                            "Use a value such as 0.002",
                        ));
                    }
                    chain.push(Box::new(CostTrackingHook::new(*cost_per_1k_tokens)));
                }
            }
        }
        Ok(chain)
    }

    /// Registry of configured tasks; shell tasks run from `base_dir`
    pub fn build_registry(&self, base_dir: &Path) -> GovflowResult<InMemoryRegistry> {
        let mut registry = InMemoryRegistry::new();
        for (name, task) in &self.tasks {
            match task {
                TaskConfig::Shell { command, shell } => {
                    let task = ShellTask::new(command.clone(), shell.clone())
                        .with_working_dir(base_dir.to_path_buf());
                    registry.register(name, task)?;
                }
                TaskConfig::Static { output } => {
                    registry.register(name, StaticTask::new(output.clone()))?;
                }
            }
        }
        Ok(registry)
    }

    pub fn build_pipeline(&self) -> GovflowResult<Pipeline> {
        let stages = self
            .stages
            .iter()
            .map(|s| -> GovflowResult<Stage> {
                let mut stage = Stage::new(s.name.clone(), s.tasks.iter().cloned())?
                    .parallel(s.parallel)
                    .required(s.required);
                if let Some(ref description) = s.description {
                    stage = stage.with_description(description.clone());
                }
                Ok(stage)
            })
            .collect::<GovflowResult<Vec<_>>>()?;

        Pipeline::new(self.name.clone(), stages)
    }

    /// Fully wired coordinator; parallel stages are capped by the tier
    pub fn build_coordinator(
        &self,
        tier: EnvironmentTier,
        base_dir: &Path,
    ) -> GovflowResult<PipelineCoordinator> {
        let pipeline = self.build_pipeline()?;
        let registry = Arc::new(self.build_registry(base_dir)?);

        let mut coordinator = PipelineCoordinator::new(pipeline, registry)
            .with_hooks(self.build_hooks()?)
            .with_max_concurrency(tier.restrictions().max_concurrent_tasks);
        if let Some(engine) = self.build_policy_engine(tier)? {
            coordinator = coordinator.with_policy_engine(engine);
        }
        Ok(coordinator)
    }

    /// Shells used by shell tasks that cannot be found on PATH
    pub fn missing_shells(&self) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for task in self.tasks.values() {
            if let TaskConfig::Shell { command, shell } = task {
                let shell_task = ShellTask::new(command.clone(), shell.clone());
                if !shell_task.check_available() && !missing.contains(shell) {
                    missing.push(shell.clone());
                }
            }
        }
        missing
    }
}

/// Directory a config file's relative paths resolve against
pub fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ExecutionContext;
    use serde_json::json;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
name: release
tier: test
policy:
  preset: minimal
hooks:
  - type: audit
  - type: sanitize
  - type: rate_limit
    max_per_minute: 5
tasks:
  build:
    type: static
    output:
      tests_passed: true
      security_scan_passed: true
  package:
    type: shell
    command: echo done
stages:
  - name: build
    tasks: [build]
  - name: ship
    tasks: [package]
    parallel: true
    required: false
    description: Package artifacts
input:
  tests_passed: true
  security_scan_passed: true
state:
  current_branch: main
"#;

    #[test]
    fn test_parse_yaml() {
        let config = ProjectConfig::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.name, "release");
        assert_eq!(config.policy.preset, PolicyPreset::Minimal);
        assert_eq!(config.hooks.len(), 3);
        assert_eq!(config.hooks[2], HookConfig::RateLimit { max_per_minute: 5 });
        assert_eq!(
            config.tasks["package"],
            TaskConfig::Shell {
                command: "echo done".into(),
                shell: "bash".into()
            }
        );
        assert!(config.stages[0].required);
        assert!(!config.stages[1].required);
        assert_eq!(config.state["current_branch"], json!("main"));
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
name = "nightly"

[policy]
gates = ["test-success"]

[tasks.check]
type = "static"
output = { tests_passed = true }

[[stages]]
name = "verify"
tasks = ["check"]
"#;
        let config = ProjectConfig::from_toml(content).unwrap();
        assert_eq!(config.policy.gates, vec!["test-success"]);
        assert_eq!(config.stages[0].tasks, vec!["check"]);
    }

    #[test]
    fn test_from_file_by_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("flow.json");
        std::fs::write(
            &path,
            r#"{"name": "j", "stages": [{"name": "s", "tasks": ["t"]}]}"#,
        )
        .unwrap();

        let config = ProjectConfig::from_file(&path).unwrap();
        assert_eq!(config.name, "j");
        assert_eq!(config.policy.preset, PolicyPreset::Tier);
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = ProjectConfig::from_file(&temp.path().join(".govflow.yaml")).unwrap_err();
        assert!(matches!(err, GovflowError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_resolve_tier() {
        let config = ProjectConfig::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.resolve_tier(None), EnvironmentTier::Test);
        assert_eq!(config.resolve_tier(Some("production")), EnvironmentTier::Production);
        assert_eq!(config.resolve_tier(Some("staging")), EnvironmentTier::Development);

        let untiered = ProjectConfig::from_yaml("name: x\nstages: []\n").unwrap();
        assert_eq!(untiered.resolve_tier(None), EnvironmentTier::Development);
    }

    #[test]
    fn test_build_gates() {
        let mut config = ProjectConfig::from_yaml(SAMPLE).unwrap();
        let gates = config.build_gates(EnvironmentTier::Test).unwrap().unwrap();
        let names: Vec<&str> = gates.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["test-success", "security-validation"]);

        config.policy.gates = vec!["approval".into()];
        let gates = config.build_gates(EnvironmentTier::Test).unwrap().unwrap();
        assert_eq!(gates.len(), 1);

        config.policy.gates = vec!["telepathy".into()];
        let err = config.build_gates(EnvironmentTier::Test).unwrap_err();
        assert!(matches!(err, GovflowError::UnknownGate { .. }));

        config.policy.gates.clear();
        config.policy.preset = PolicyPreset::None;
        assert!(config.build_policy_engine(EnvironmentTier::Test).unwrap().is_none());
    }

    #[test]
    fn test_build_hooks() {
        let mut config = ProjectConfig::from_yaml(SAMPLE).unwrap();
        let chain = config.build_hooks().unwrap();
        assert_eq!(chain.names(), vec!["audit-logging", "data-sanitization", "rate-limiting"]);

        config.hooks = vec![HookConfig::RateLimit { max_per_minute: 0 }];
        assert!(config.build_hooks().unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_build_pipeline_rejects_empty_stage() {
        let config = ProjectConfig::from_yaml(
            "name: x\nstages:\n  - name: empty\n    tasks: []\n",
        )
        .unwrap();
        let err = config.build_pipeline().unwrap_err();
        assert!(matches!(err, GovflowError::EmptyStage { .. }));
    }

    #[test]
    fn test_base_dir() {
        assert_eq!(base_dir(Path::new(".govflow.yaml")), PathBuf::from("."));
        assert_eq!(base_dir(Path::new("ci/flow.yaml")), PathBuf::from("ci"));
    }

    #[tokio::test]
    async fn test_build_and_run() {
        let config = ProjectConfig::from_yaml(
            r#"
name: smoke
policy:
  preset: minimal
tasks:
  build:
    type: static
    output: { tests_passed: true, security_scan_passed: true }
stages:
  - name: build
    tasks: [build]
input:
  tests_passed: true
  security_scan_passed: true
"#,
        )
        .unwrap();

        let tier = config.resolve_tier(Some("production"));
        let coordinator = config.build_coordinator(tier, Path::new(".")).unwrap();
        let context = ExecutionContext::new().with_state(config.state.clone());
        let result = coordinator.run(config.input.clone(), context).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output("build").unwrap()["tests_passed"], json!(true));
    }
}
