//! Named workflows
//!
//! A workflow is an independently invokable unit above the
//! orchestrator. Internal failures never escape the registry's `run`:
//! they settle as a failed WorkflowResult so the caller always gets a
//! status envelope back.

pub mod support;

pub use support::CustomerSupportWorkflow;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::orchestration::Orchestrator;
use crate::storage::ExecutionStore;
use crate::{Error, Result};

/// Execution context handed to a workflow
#[derive(Clone)]
pub struct WorkflowContext {
    /// Identifier of the caller (channel, user, service)
    pub caller: String,
    /// Free-form workflow input
    pub input: Value,
    /// Orchestrator reference for workflows that delegate analysis
    pub orchestrator: Option<Arc<Orchestrator>>,
}

impl WorkflowContext {
    pub fn new(caller: impl Into<String>, input: Value) -> Self {
        Self {
            caller: caller.into(),
            input,
            orchestrator: None,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: Arc<Orchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }
}

/// Terminal state of a workflow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Completed,
    Failed,
    Partial,
}

/// Result envelope returned by every workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow: String,
    pub status: WorkflowStatus,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock seconds
    pub execution_time: f64,
}

impl WorkflowResult {
    pub fn completed(workflow: impl Into<String>, output: Value) -> Self {
        Self {
            workflow: workflow.into(),
            status: WorkflowStatus::Completed,
            output,
            error: None,
            execution_time: 0.0,
        }
    }

    pub fn failed(workflow: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            workflow: workflow.into(),
            status: WorkflowStatus::Failed,
            output: Value::Null,
            error: Some(error.into()),
            execution_time: 0.0,
        }
    }
}

/// Workflow trait
///
/// `execute` may fail with an error; the registry converts that into
/// a failed WorkflowResult at the single catch seam.
#[async_trait]
pub trait Workflow: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn execute(&self, ctx: WorkflowContext) -> Result<WorkflowResult>;
}

/// Registry of workflows keyed by name
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Arc<dyn Workflow>>,
    store: Option<Arc<Mutex<ExecutionStore>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            workflows: HashMap::new(),
            store: None,
        }
    }

    /// Attach the execution store for run bookkeeping
    pub fn with_store(mut self, store: Arc<Mutex<ExecutionStore>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn register(&mut self, workflow: Arc<dyn Workflow>) {
        info!("Registering workflow: {}", workflow.name());
        self.workflows.insert(workflow.name().to_string(), workflow);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.workflows.keys().map(|s| s.as_str()).collect()
    }

    /// Execute a named workflow.
    ///
    /// Unknown names error; every failure inside the workflow itself
    /// settles as a failed WorkflowResult instead.
    pub async fn run(&self, name: &str, ctx: WorkflowContext) -> Result<WorkflowResult> {
        let workflow = self
            .get(name)
            .ok_or_else(|| Error::WorkflowNotFound(name.to_string()))?;

        let started = Instant::now();
        let input = ctx.input.clone();

        let mut result = match workflow.execute(ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Workflow {} failed: {}", name, e);
                WorkflowResult::failed(name, e.to_string())
            }
        };
        result.execution_time = started.elapsed().as_secs_f64();

        self.record(&result, &input);
        Ok(result)
    }

    fn record(&self, result: &WorkflowResult, input: &Value) {
        let Some(store) = &self.store else {
            return;
        };

        let status = match result.status {
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Partial => "partial",
        };
        let output = serde_json::to_string(&result.output).ok();
        let execution_id = uuid::Uuid::new_v4().to_string();

        let store = store.lock().unwrap();
        if let Err(e) = store.workflow_execution(
            &execution_id,
            &result.workflow,
            status,
            &input.to_string(),
            output.as_deref(),
            result.error.as_deref(),
            (result.execution_time * 1_000.0) as i64,
        ) {
            warn!("Failed to record workflow execution: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoWorkflow;

    #[async_trait]
    impl Workflow for EchoWorkflow {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Returns its input unchanged"
        }

        async fn execute(&self, ctx: WorkflowContext) -> Result<WorkflowResult> {
            Ok(WorkflowResult::completed("echo", ctx.input))
        }
    }

    struct PanickyWorkflow;

    #[async_trait]
    impl Workflow for PanickyWorkflow {
        fn name(&self) -> &str {
            "panicky"
        }

        fn description(&self) -> &str {
            "Always errors"
        }

        async fn execute(&self, _ctx: WorkflowContext) -> Result<WorkflowResult> {
            Err(Error::Other("internal explosion".to_string()))
        }
    }

    #[tokio::test]
    async fn test_run_unknown_workflow() {
        let registry = WorkflowRegistry::new();
        let ctx = WorkflowContext::new("test", json!({}));

        let result = registry.run("missing", ctx).await;
        assert!(matches!(result, Err(Error::WorkflowNotFound(_))));
    }

    #[tokio::test]
    async fn test_run_completes() {
        let mut registry = WorkflowRegistry::new();
        registry.register(Arc::new(EchoWorkflow));

        let ctx = WorkflowContext::new("test", json!({"hello": "world"}));
        let result = registry.run("echo", ctx).await.unwrap();

        assert_eq!(result.status, WorkflowStatus::Completed);
        assert_eq!(result.output, json!({"hello": "world"}));
    }

    #[tokio::test]
    async fn test_internal_error_becomes_failed_result() {
        let mut registry = WorkflowRegistry::new();
        registry.register(Arc::new(PanickyWorkflow));

        let ctx = WorkflowContext::new("test", json!({}));
        let result = registry.run("panicky", ctx).await.unwrap();

        assert_eq!(result.status, WorkflowStatus::Failed);
        assert!(result.error.unwrap().contains("internal explosion"));
    }

    #[tokio::test]
    async fn test_run_records_to_store() {
        let store = Arc::new(Mutex::new(ExecutionStore::in_memory().unwrap()));
        let mut registry = WorkflowRegistry::new().with_store(Arc::clone(&store));
        registry.register(Arc::new(EchoWorkflow));

        let ctx = WorkflowContext::new("test", json!({"ping": true}));
        registry.run("echo", ctx).await.unwrap();

        let store = store.lock().unwrap();
        assert_eq!(store.workflow_execution_count("echo").unwrap(), 1);
    }
}
