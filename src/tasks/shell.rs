// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Shell task
//!
//! Runs a shell command. The task input and upstream outputs are passed as
//! JSON in `GOVFLOW_INPUT` and `GOVFLOW_UPSTREAM`. A JSON object printed on
//! stdout becomes the task output; any other stdout is wrapped as
//! `{"stdout": ..., "exit_code": 0}`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::process::Command;

use super::{Payload, Task, TaskContext};

/// Shell command task
#[derive(Debug, Clone)]
pub struct ShellTask {
    command: String,
    shell: String,
    working_dir: Option<PathBuf>,
}

impl ShellTask {
    /// Create a task running `command` with `shell -c`
    pub fn new(command: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: shell.into(),
            working_dir: None,
        }
    }

    /// Run the command from a specific directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    /// Check whether the configured shell can be found on PATH
    pub fn check_available(&self) -> bool {
        which::which(&self.shell).is_ok()
    }

    fn parse_stdout(stdout: &str) -> Value {
        match serde_json::from_str::<Value>(stdout.trim()) {
            Ok(value @ Value::Object(_)) => value,
            _ => json!({
                "stdout": stdout,
                "exit_code": 0,
            }),
        }
    }
}

#[async_trait]
impl Task for ShellTask {
    async fn execute(&self, input: Payload, context: &TaskContext) -> anyhow::Result<Value> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(&self.command);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.env("GOVFLOW_INPUT", serde_json::to_string(&input)?);
        cmd.env(
            "GOVFLOW_UPSTREAM",
            serde_json::to_string(context.upstream_outputs())?,
        );

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Shell '{}' may not be available", self.shell))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            bail!(
                "command `{}` exited with code {}: {}",
                self.command,
                exit_code,
                stderr.trim()
            );
        }

        Ok(Self::parse_stdout(&stdout))
    }
}
