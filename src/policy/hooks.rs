// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 govflow contributors

//! Policy hooks
//!
//! Hooks intercept a task outside the gate mechanism. Before execution a hook
//! may let the input through, replace it, or block the task; after execution
//! it may accept or reject the output. A [`HookChain`] runs hooks in
//! registration order and stops at the first hook that does not allow.

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::errors::panic_message;
use crate::tasks::{Payload, TaskContext};

/// Verdict of a hook before a task runs
#[derive(Debug, Clone, PartialEq)]
pub enum PreHookDecision {
    /// Proceed with the input unchanged
    Allow,
    /// Proceed with a replacement input
    Replace(Payload),
    /// Do not run the task
    Block { reason: String },
}

/// Verdict of a hook after a task ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostHookDecision {
    /// Publish the output
    Allow,
    /// Withhold the output
    Reject { reason: String },
}

/// Lifecycle interceptor
#[async_trait]
pub trait PolicyHook: Send + Sync {
    /// Hook identifier (e.g. `audit-logging`)
    fn name(&self) -> &str;

    async fn before_execute(
        &self,
        task_name: &str,
        input: &Payload,
        context: &TaskContext,
    ) -> PreHookDecision;

    async fn after_execute(
        &self,
        task_name: &str,
        output: &Value,
        context: &TaskContext,
    ) -> PostHookDecision;
}

/// The hook that stopped a chain and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookVeto {
    pub hook: String,
    pub reason: String,
}

/// Ordered list of hooks
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn PolicyHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; hooks run in the order they were added
    pub fn push(&mut self, hook: Box<dyn PolicyHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    /// Run every `before_execute` in order.
    ///
    /// Each hook sees the input as left by the previous one. Returns the
    /// final input, or the first block. A panicking hook counts as a block.
    pub async fn before(
        &self,
        task_name: &str,
        mut input: Payload,
        context: &TaskContext,
    ) -> Result<Payload, HookVeto> {
        for hook in &self.hooks {
            let decision = AssertUnwindSafe(hook.before_execute(task_name, &input, context))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| PreHookDecision::Block {
                    reason: format!("hook panicked: {}", panic_message(panic.as_ref())),
                });
            match decision {
                PreHookDecision::Allow => {}
                PreHookDecision::Replace(replacement) => {
                    tracing::debug!(task = %task_name, hook = %hook.name(), "hook replaced input");
                    input = replacement;
                }
                PreHookDecision::Block { reason } => {
                    tracing::warn!(
                        task = %task_name,
                        hook = %hook.name(),
                        %reason,
                        "hook blocked task"
                    );
                    return Err(HookVeto {
                        hook: hook.name().to_string(),
                        reason,
                    });
                }
            }
        }
        Ok(input)
    }

    /// Run every `after_execute` in order, stopping at the first rejection.
    /// A panicking hook counts as a rejection.
    pub async fn after(
        &self,
        task_name: &str,
        output: &Value,
        context: &TaskContext,
    ) -> Result<(), HookVeto> {
        for hook in &self.hooks {
            let decision = AssertUnwindSafe(hook.after_execute(task_name, output, context))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| PostHookDecision::Reject {
                    reason: format!("hook panicked: {}", panic_message(panic.as_ref())),
                });
            if let PostHookDecision::Reject { reason } = decision {
                tracing::warn!(
                    task = %task_name,
                    hook = %hook.name(),
                    %reason,
                    "hook rejected output"
                );
                return Err(HookVeto {
                    hook: hook.name().to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in hooks
// ─────────────────────────────────────────────────────────────────────────────

/// Logs every task start and finish
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditLoggingHook;

#[async_trait]
impl PolicyHook for AuditLoggingHook {
    fn name(&self) -> &str {
        "audit-logging"
    }

    async fn before_execute(
        &self,
        task_name: &str,
        input: &Payload,
        _context: &TaskContext,
    ) -> PreHookDecision {
        let keys: Vec<&str> = input.keys().map(String::as_str).collect();
        tracing::info!(
            task = %task_name,
            input_keys = ?keys,
            phase = "pre-execution",
            "AUDIT: task starting"
        );
        PreHookDecision::Allow
    }

    async fn after_execute(
        &self,
        task_name: &str,
        output: &Value,
        _context: &TaskContext,
    ) -> PostHookDecision {
        let keys: Vec<&str> = output
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        tracing::info!(
            task = %task_name,
            output_keys = ?keys,
            phase = "post-execution",
            "AUDIT: task completed"
        );
        PostHookDecision::Allow
    }
}

const REDACTED: &str = "***REDACTED***";

/// Redacts sensitive keys from task input
#[derive(Debug, Clone)]
pub struct DataSanitizationHook {
    sensitive_keys: Vec<String>,
}

impl DataSanitizationHook {
    pub fn new() -> Self {
        Self::with_keys(
            ["password", "api_key", "secret", "token", "ssn", "credit_card"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// Match keys containing any of these fragments (case-insensitive)
    pub fn with_keys(sensitive_keys: Vec<String>) -> Self {
        Self {
            sensitive_keys: sensitive_keys.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_keys.iter().any(|s| key.contains(s.as_str()))
    }

    /// Recursively redact an object
    pub fn sanitize(&self, data: &Payload) -> Payload {
        data.iter()
            .map(|(key, value)| {
                let cleaned = if self.is_sensitive(key) {
                    Value::String(REDACTED.to_string())
                } else {
                    self.sanitize_value(value)
                };
                (key.clone(), cleaned)
            })
            .collect()
    }

    fn sanitize_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.sanitize(map)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => Value::Object(self.sanitize(map)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

impl Default for DataSanitizationHook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyHook for DataSanitizationHook {
    fn name(&self) -> &str {
        "data-sanitization"
    }

    async fn before_execute(
        &self,
        _task_name: &str,
        input: &Payload,
        _context: &TaskContext,
    ) -> PreHookDecision {
        PreHookDecision::Replace(self.sanitize(input))
    }

    async fn after_execute(
        &self,
        _task_name: &str,
        _output: &Value,
        _context: &TaskContext,
    ) -> PostHookDecision {
        PostHookDecision::Allow
    }
}

/// Caps how often each task may start within a sliding window
pub struct RateLimitHook {
    max_executions: usize,
    window: Duration,
    executions: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimitHook {
    /// Allow `max_per_minute` starts per task per minute
    pub fn new(max_per_minute: usize) -> Self {
        Self::with_window(max_per_minute, Duration::from_secs(60))
    }

    pub fn with_window(max_executions: usize, window: Duration) -> Self {
        Self {
            max_executions,
            window,
            executions: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PolicyHook for RateLimitHook {
    fn name(&self) -> &str {
        "rate-limiting"
    }

    async fn before_execute(
        &self,
        task_name: &str,
        _input: &Payload,
        _context: &TaskContext,
    ) -> PreHookDecision {
        let now = Instant::now();
        let mut executions = self.executions.lock().await;
        let history = executions.entry(task_name.to_string()).or_default();

        while let Some(oldest) = history.front() {
            if now.duration_since(*oldest) >= self.window {
                history.pop_front();
            } else {
                break;
            }
        }

        if history.len() >= self.max_executions {
            return PreHookDecision::Block {
                reason: format!(
                    "Rate limit exceeded: {} per {}s",
                    self.max_executions,
                    self.window.as_secs()
                ),
            };
        }

        history.push_back(now);
        PreHookDecision::Allow
    }

    async fn after_execute(
        &self,
        _task_name: &str,
        _output: &Value,
        _context: &TaskContext,
    ) -> PostHookDecision {
        PostHookDecision::Allow
    }
}

/// Accumulates an estimated cost from `metadata.tokens_used` in outputs
pub struct CostTrackingHook {
    cost_per_1k_tokens: f64,
    total_cost: Mutex<f64>,
}

impl CostTrackingHook {
    pub fn new(cost_per_1k_tokens: f64) -> Self {
        Self {
            cost_per_1k_tokens,
            total_cost: Mutex::new(0.0),
        }
    }

    pub async fn total_cost(&self) -> f64 {
        *self.total_cost.lock().await
    }

    pub async fn reset(&self) {
        *self.total_cost.lock().await = 0.0;
        tracing::info!("cost tracking reset");
    }
}

#[async_trait]
impl PolicyHook for CostTrackingHook {
    fn name(&self) -> &str {
        "cost-tracking"
    }

    async fn before_execute(
        &self,
        _task_name: &str,
        _input: &Payload,
        _context: &TaskContext,
    ) -> PreHookDecision {
        PreHookDecision::Allow
    }

    async fn after_execute(
        &self,
        task_name: &str,
        output: &Value,
        _context: &TaskContext,
    ) -> PostHookDecision {
        let tokens = output
            .get("metadata")
            .and_then(|m| m.get("tokens_used"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let cost = tokens as f64 / 1000.0 * self.cost_per_1k_tokens;

        let mut total = self.total_cost.lock().await;
        *total += cost;
        tracing::info!(task = %task_name, tokens, cost, total = *total, "COST: usage tracked");

        PostHookDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected object"),
        }
    }

    struct Recording {
        name: &'static str,
        pre: PreHookDecision,
        post: PostHookDecision,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PolicyHook for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_execute(&self, _: &str, _: &Payload, _: &TaskContext) -> PreHookDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pre.clone()
        }

        async fn after_execute(&self, _: &str, _: &Value, _: &TaskContext) -> PostHookDecision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.post.clone()
        }
    }

    fn recording(
        name: &'static str,
        pre: PreHookDecision,
        post: PostHookDecision,
    ) -> (Box<dyn PolicyHook>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook = Recording {
            name,
            pre,
            post,
            calls: calls.clone(),
        };
        (Box::new(hook), calls)
    }

    #[tokio::test]
    async fn test_chain_short_circuits_on_block() {
        let (blocker, _) = recording(
            "blocker",
            PreHookDecision::Block { reason: "nope".into() },
            PostHookDecision::Allow,
        );
        let (later, later_calls) =
            recording("later", PreHookDecision::Allow, PostHookDecision::Allow);

        let mut chain = HookChain::new();
        chain.push(blocker);
        chain.push(later);

        let veto = chain
            .before("task", Payload::new(), &TaskContext::default())
            .await
            .unwrap_err();
        assert_eq!(veto.hook, "blocker");
        assert_eq!(veto.reason, "nope");
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_threads_replacement_input() {
        let (replace, _) = recording(
            "replace",
            PreHookDecision::Replace(payload(json!({"password": "hunter2", "user": "ann"}))),
            PostHookDecision::Allow,
        );

        let mut chain = HookChain::new();
        chain.push(replace);
        chain.push(Box::new(DataSanitizationHook::new()));

        let input = chain
            .before("task", Payload::new(), &TaskContext::default())
            .await
            .unwrap();
        assert_eq!(input["password"], json!(REDACTED));
        assert_eq!(input["user"], json!("ann"));
    }

    #[tokio::test]
    async fn test_chain_after_stops_at_reject() {
        let (rejecter, _) = recording(
            "rejecter",
            PreHookDecision::Allow,
            PostHookDecision::Reject { reason: "bad output".into() },
        );
        let (later, later_calls) =
            recording("later", PreHookDecision::Allow, PostHookDecision::Allow);

        let mut chain = HookChain::new();
        chain.push(rejecter);
        chain.push(later);

        let veto = chain
            .after("task", &json!({}), &TaskContext::default())
            .await
            .unwrap_err();
        assert_eq!(veto.hook, "rejecter");
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    struct Panicking;

    #[async_trait]
    impl PolicyHook for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn before_execute(&self, _: &str, _: &Payload, _: &TaskContext) -> PreHookDecision {
            panic!("quota store unreachable")
        }

        async fn after_execute(&self, _: &str, _: &Value, _: &TaskContext) -> PostHookDecision {
            panic!("ledger write failed")
        }
    }

    #[tokio::test]
    async fn test_panicking_hook_blocks_before_execution() {
        let (later, later_calls) =
            recording("later", PreHookDecision::Allow, PostHookDecision::Allow);

        let mut chain = HookChain::new();
        chain.push(Box::new(Panicking));
        chain.push(later);

        let veto = chain
            .before("task", Payload::new(), &TaskContext::default())
            .await
            .unwrap_err();
        assert_eq!(veto.hook, "panicking");
        assert_eq!(veto.reason, "hook panicked: quota store unreachable");
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_hook_rejects_output() {
        let mut chain = HookChain::new();
        chain.push(Box::new(Panicking));

        let veto = chain
            .after("task", &json!({"ok": true}), &TaskContext::default())
            .await
            .unwrap_err();
        assert_eq!(veto.hook, "panicking");
        assert_eq!(veto.reason, "hook panicked: ledger write failed");
    }

    #[test]
    fn test_chain_debug_lists_hook_names() {
        let mut chain = HookChain::new();
        chain.push(Box::new(AuditLoggingHook));
        chain.push(Box::new(DataSanitizationHook::new()));

        let debug = format!("{:?}", chain);
        assert!(debug.contains("audit-logging"));
        assert!(debug.contains("data-sanitization"));
    }

    #[test]
    fn test_sanitize_nested() {
        let hook = DataSanitizationHook::new();
        let cleaned = hook.sanitize(&payload(json!({
            "API_KEY": "abc",
            "nested": {"auth_token": "t", "keep": 1},
            "list": [{"secret_value": "s"}, 5]
        })));

        assert_eq!(cleaned["API_KEY"], json!(REDACTED));
        assert_eq!(cleaned["nested"]["auth_token"], json!(REDACTED));
        assert_eq!(cleaned["nested"]["keep"], json!(1));
        assert_eq!(cleaned["list"][0]["secret_value"], json!(REDACTED));
        assert_eq!(cleaned["list"][1], json!(5));
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_after_limit() {
        let hook = RateLimitHook::new(2);
        let ctx = TaskContext::default();

        assert_eq!(hook.before_execute("t", &Payload::new(), &ctx).await, PreHookDecision::Allow);
        assert_eq!(hook.before_execute("t", &Payload::new(), &ctx).await, PreHookDecision::Allow);
        assert!(matches!(
            hook.before_execute("t", &Payload::new(), &ctx).await,
            PreHookDecision::Block { .. }
        ));
        // limits are per task
        assert_eq!(
            hook.before_execute("other", &Payload::new(), &ctx).await,
            PreHookDecision::Allow
        );
    }

    #[tokio::test]
    async fn test_rate_limit_window_expires() {
        let hook = RateLimitHook::with_window(1, Duration::from_millis(20));
        let ctx = TaskContext::default();

        assert_eq!(hook.before_execute("t", &Payload::new(), &ctx).await, PreHookDecision::Allow);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(hook.before_execute("t", &Payload::new(), &ctx).await, PreHookDecision::Allow);
    }

    #[tokio::test]
    async fn test_cost_tracking_accumulates() {
        let hook = CostTrackingHook::new(0.5);
        let ctx = TaskContext::default();
        let output = json!({"metadata": {"tokens_used": 2000}});

        hook.after_execute("t", &output, &ctx).await;
        hook.after_execute("t", &output, &ctx).await;
        hook.after_execute("t", &json!({"no": "metadata"}), &ctx).await;
        assert!((hook.total_cost().await - 2.0).abs() < f64::EPSILON);

        hook.reset().await;
        assert_eq!(hook.total_cost().await, 0.0);
    }
}
