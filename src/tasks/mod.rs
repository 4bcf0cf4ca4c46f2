// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Tasks and task resolution
//!
//! A task is an arbitrary unit of work that receives an input payload and a
//! read-only [`TaskContext`] and returns a JSON output. The coordinator finds
//! tasks by name through a [`TaskRegistry`].

mod shell;

pub use shell::ShellTask;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::errors::GovflowError;

/// Input payload handed to a task
pub type Payload = Map<String, Value>;

/// Task outputs keyed by task name
pub type OutputMap = BTreeMap<String, Value>;

/// Read-only view a task executes against
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    upstream_outputs: Arc<OutputMap>,
    pipeline_state: Arc<Payload>,
}

impl TaskContext {
    pub fn new(upstream_outputs: Arc<OutputMap>, pipeline_state: Arc<Payload>) -> Self {
        Self {
            upstream_outputs,
            pipeline_state,
        }
    }

    /// Outputs published by earlier stages (and, in a sequential stage,
    /// by earlier tasks of the same stage)
    pub fn upstream_outputs(&self) -> &OutputMap {
        &self.upstream_outputs
    }

    /// Output of one upstream task
    pub fn upstream(&self, task_name: &str) -> Option<&Value> {
        self.upstream_outputs.get(task_name)
    }

    /// Caller-supplied state shared by every task of the run
    pub fn pipeline_state(&self) -> &Payload {
        &self.pipeline_state
    }
}

/// A unit of work
#[async_trait]
pub trait Task: Send + Sync {
    /// Run the task
    ///
    /// # Arguments
    /// * `input` - The input payload (possibly replaced by a pre-hook)
    /// * `context` - Upstream outputs and pipeline state
    async fn execute(&self, input: Payload, context: &TaskContext) -> anyhow::Result<Value>;
}

/// Resolves task names to runnable tasks
pub trait TaskRegistry: Send + Sync {
    /// Look up a task by name
    fn resolve(&self, name: &str) -> Option<Arc<dyn Task>>;

    /// Names of every registered task
    fn task_names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}

/// Registry backed by a map
#[derive(Default)]
pub struct InMemoryRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under a unique name
    pub fn register<T: Task + 'static>(&mut self, name: &str, task: T) -> Result<(), GovflowError> {
        self.register_arc(name, Arc::new(task))
    }

    /// Register an already shared task under a unique name
    pub fn register_arc(&mut self, name: &str, task: Arc<dyn Task>) -> Result<(), GovflowError> {
        if self.tasks.contains_key(name) {
            return Err(GovflowError::DuplicateTask {
                task: name.to_string(),
            });
        }
        self.tasks.insert(name.to_string(), task);
        tracing::debug!(task = %name, "registered task");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskRegistry for InMemoryRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    fn task_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Task that always returns the same value
#[derive(Debug, Clone)]
pub struct StaticTask {
    output: Value,
}

impl StaticTask {
    pub fn new(output: Value) -> Self {
        Self { output }
    }
}

#[async_trait]
impl Task for StaticTask {
    async fn execute(&self, _input: Payload, _context: &TaskContext) -> anyhow::Result<Value> {
        Ok(self.output.clone())
    }
}
