//! Analysis orchestration
//!
//! Implements the run lifecycle: resolve requested kinds against the
//! registry, dispatch every resolved agent concurrently under a
//! concurrency cap, retry each agent independently with a flat delay,
//! aggregate the settled results, and report through the status
//! tracker, the result cache and the execution store.

pub mod aggregate;
pub mod types;

pub use aggregate::AggregationStrategy;
pub use types::{AnalysisRequest, AnalysisResponse, ResponseMetadata};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::agents::{AgentInput, AgentRegistry, AgentResult, AgentRunner, AnalysisKind};
use crate::cache::ResultCache;
use crate::config::OrchestrationConfig;
use crate::status::StatusTracker;
use crate::storage::ExecutionStore;
use crate::{Error, Result};

/// Coordinator for analysis runs
///
/// Owns the agent registry and the run-level policy. Constructed once
/// at startup and shared behind an `Arc`; the registry is read-only
/// from then on.
pub struct Orchestrator {
    registry: AgentRegistry,
    config: OrchestrationConfig,
    tracker: Arc<StatusTracker>,
    cache: ResultCache,
    store: Option<Arc<Mutex<ExecutionStore>>>,
}

impl Orchestrator {
    pub fn new(
        registry: AgentRegistry,
        config: OrchestrationConfig,
        tracker: Arc<StatusTracker>,
    ) -> Self {
        let cache = ResultCache::new(config.cache_enabled, config.cache_ttl_secs);
        if config.priority_enabled {
            // Priority stays informational; dispatch does not reorder on it
            info!("priority_enabled is set; agent priority is advisory only");
        }
        Self {
            registry,
            config,
            tracker,
            cache,
            store: None,
        }
    }

    /// Attach the execution store for run bookkeeping
    pub fn with_store(mut self, store: Arc<Mutex<ExecutionStore>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &OrchestrationConfig {
        &self.config
    }

    /// Cached aggregate for a finished run, if still fresh
    pub async fn cached(&self, analysis_id: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
        self.cache.get(analysis_id).await
    }

    /// Execute one analysis run to completion or failure.
    ///
    /// The status entry for `analysis_id` is expected to exist (the
    /// submitting side creates it); the run moves it to processing,
    /// feeds it per-agent progress and leaves it in a terminal state.
    ///
    /// The contract is all-or-nothing: every resolved agent must
    /// succeed within its retry budget or the whole run fails with the
    /// first exhaustion error, after all dispatched agents settled.
    pub async fn run_analysis(
        &self,
        analysis_id: &str,
        request: AnalysisRequest,
    ) -> Result<AnalysisResponse> {
        let started = Instant::now();

        if let Err(e) = request.validate() {
            self.tracker.fail(analysis_id, e.to_string()).await;
            return Err(e);
        }

        let requested_types = request.effective_types(&self.config.analyze_by_default);
        if requested_types.is_empty() {
            let e = Error::Validation("analysis_types must not be empty".to_string());
            self.tracker.fail(analysis_id, e.to_string()).await;
            return Err(e);
        }

        info!(
            "Starting analysis {} for project {} ({:?}, priority {:?})",
            analysis_id, request.project_id, requested_types, request.priority
        );
        self.tracker.mark_processing(analysis_id).await;
        self.record_started(analysis_id, &request);

        // resolving
        let runners = self.registry.resolve(&requested_types);
        if runners.is_empty() {
            let e = Error::NoAgentsAvailable;
            self.fail_run(analysis_id, &e, started).await;
            return Err(e);
        }

        // dispatching
        let settled = self.dispatch(analysis_id, &request, runners).await;

        let mut successes: Vec<(AnalysisKind, AgentResult)> = Vec::new();
        let mut first_error: Option<Error> = None;
        for outcome in settled {
            match outcome {
                Ok(pair) => successes.push(pair),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            self.fail_run(analysis_id, &e, started).await;
            return Err(e);
        }

        // aggregating
        let agents_used: Vec<AnalysisKind> = successes.iter().map(|(kind, _)| *kind).collect();
        let results = aggregate::aggregate(self.config.result_aggregation, &successes);

        self.cache.put(analysis_id, results.clone()).await;

        let execution_time = started.elapsed().as_secs_f64();
        let response = AnalysisResponse {
            success: true,
            project_id: request.project_id.clone(),
            analysis_types: requested_types,
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time,
            results: results.clone(),
            metadata: ResponseMetadata {
                agents_used,
                aggregation: self.config.result_aggregation,
            },
        };

        self.tracker
            .complete(analysis_id, results, execution_time)
            .await;
        self.record_completed(analysis_id, &response, started);

        info!(
            "Analysis {} completed in {:.3}s with {} agents",
            analysis_id,
            execution_time,
            response.metadata.agents_used.len()
        );
        Ok(response)
    }

    /// Fan out every resolved runner and wait for all of them to
    /// settle (the fan-in barrier), successfully or by exhausting
    /// retries.
    async fn dispatch(
        &self,
        analysis_id: &str,
        request: &AnalysisRequest,
        runners: Vec<Arc<AgentRunner>>,
    ) -> Vec<Result<(AnalysisKind, AgentResult)>> {
        let total = runners.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_agents));
        let completed = Arc::new(AtomicUsize::new(0));
        let mut join_set = JoinSet::new();

        let input = AgentInput {
            project_id: request.project_id.clone(),
            query_params: request.query_params.clone(),
            confidence_threshold: request.confidence_threshold,
        };
        let timeout_ms = request.timeout_secs.saturating_mul(1_000);
        let retry_delay_ms = self.config.agent_timeout_ms;
        let max_retries = self.config.max_retries;

        for runner in runners {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let tracker = Arc::clone(&self.tracker);
            let store = self.store.clone();
            let completed = Arc::clone(&completed);
            let input = input.clone();
            let analysis_id = analysis_id.to_string();
            let kind = runner.kind();

            join_set.spawn(async move {
                let _permit = permit;
                tracker.agent_started(&analysis_id, kind).await;

                let attempt_started = Instant::now();
                let outcome =
                    run_with_retry(&runner, &input, timeout_ms, retry_delay_ms, max_retries).await;

                if let Some(store) = &store {
                    record_agent_outcome(store, &analysis_id, kind, &input, &outcome, attempt_started);
                }

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                tracker
                    .agent_completed(&analysis_id, kind, done as f64 / total as f64)
                    .await;

                outcome.map(|result| (kind, result))
            });
        }

        let mut settled = Vec::with_capacity(total);
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => settled.push(outcome),
                Err(e) => {
                    warn!("Dispatched agent task aborted: {}", e);
                    settled.push(Err(Error::Other(format!("agent task aborted: {e}"))));
                }
            }
        }
        settled
    }

    async fn fail_run(&self, analysis_id: &str, error: &Error, started: Instant) {
        warn!("Analysis {} failed: {}", analysis_id, error);
        self.tracker.fail(analysis_id, error.to_string()).await;

        if let Some(store) = &self.store {
            let elapsed_ms = started.elapsed().as_millis() as i64;
            let store = store.lock().unwrap();
            if let Err(e) = store.analysis_failed(analysis_id, &error.to_string(), elapsed_ms) {
                warn!("Failed to record analysis failure: {}", e);
            }
        }
    }

    fn record_started(&self, analysis_id: &str, request: &AnalysisRequest) {
        if let Some(store) = &self.store {
            let request_json =
                serde_json::to_string(request).unwrap_or_else(|_| "{}".to_string());
            let store = store.lock().unwrap();
            if let Err(e) = store.analysis_started(analysis_id, &request.project_id, &request_json)
            {
                warn!("Failed to record analysis start: {}", e);
            }
        }
    }

    fn record_completed(&self, analysis_id: &str, response: &AnalysisResponse, started: Instant) {
        if let Some(store) = &self.store {
            let result_json = serde_json::to_string(&response.results)
                .unwrap_or_else(|_| "{}".to_string());
            let elapsed_ms = started.elapsed().as_millis() as i64;
            let store = store.lock().unwrap();
            if let Err(e) = store.analysis_completed(analysis_id, &result_json, elapsed_ms) {
                warn!("Failed to record analysis completion: {}", e);
            }
        }
    }
}

/// Retry loop around one agent's run.
///
/// Up to `max_retries` retries after the first failed attempt, with a
/// flat inter-attempt delay (no backoff). Exhaustion maps to
/// `RetriesExhausted`, the condition that turns one agent's failure
/// into the whole run's failure.
async fn run_with_retry(
    runner: &AgentRunner,
    input: &AgentInput,
    timeout_ms: u64,
    retry_delay_ms: u64,
    max_retries: u32,
) -> Result<AgentResult> {
    let kind = runner.kind();
    let mut last_error = String::new();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            debug!(
                "Retrying agent {} (attempt {}/{})",
                kind,
                attempt + 1,
                max_retries + 1
            );
            tokio::time::sleep(Duration::from_millis(retry_delay_ms)).await;
        }

        match runner.run(input.clone(), timeout_ms).await {
            Ok(result) if result.success => return Ok(result),
            Ok(result) => {
                last_error = result
                    .error
                    .unwrap_or_else(|| "agent reported failure".to_string());
            }
            Err(e) => last_error = e.to_string(),
        }

        warn!(
            "Agent {} attempt {}/{} failed: {}",
            kind,
            attempt + 1,
            max_retries + 1,
            last_error
        );
    }

    Err(Error::RetriesExhausted {
        kind,
        attempts: max_retries + 1,
        last_error,
    })
}

/// Persist one settled agent outcome as an execution row
fn record_agent_outcome(
    store: &Arc<Mutex<ExecutionStore>>,
    analysis_id: &str,
    kind: AnalysisKind,
    input: &AgentInput,
    outcome: &Result<AgentResult>,
    started: Instant,
) {
    let input_json = serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string());
    let elapsed_ms = started.elapsed().as_millis() as i64;

    let (status, output, error) = match outcome {
        Ok(result) => (
            "completed",
            serde_json::to_string(&result.data).ok(),
            None,
        ),
        Err(e) => ("failed", None, Some(e.to_string())),
    };

    let store = store.lock().unwrap();
    if let Err(e) = store.agent_execution(
        analysis_id,
        kind.as_str(),
        status,
        &input_json,
        output.as_deref(),
        error.as_deref(),
        elapsed_ms,
    ) {
        warn!("Failed to record agent execution: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::types::{AgentDescriptor, AnalysisAgent};
    use crate::status::AnalysisState;
    use async_trait::async_trait;
    use serde_json::{Map, json};
    use std::sync::atomic::AtomicU32;

    struct StaticAgent {
        descriptor: AgentDescriptor,
        data: Map<String, serde_json::Value>,
    }

    impl StaticAgent {
        fn new(kind: AnalysisKind, key: &str, value: serde_json::Value) -> Self {
            let mut data = Map::new();
            data.insert(key.to_string(), value);
            Self {
                descriptor: AgentDescriptor::new(kind),
                data,
            }
        }
    }

    #[async_trait]
    impl AnalysisAgent for StaticAgent {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn process(&self, _input: AgentInput) -> Result<AgentResult> {
            Ok(AgentResult::ok(self.data.clone(), 0.9))
        }
    }

    /// Fails a fixed number of times, then succeeds
    struct FlakyAgent {
        descriptor: AgentDescriptor,
        failures_left: AtomicU32,
    }

    impl FlakyAgent {
        fn new(kind: AnalysisKind, failures: u32) -> Self {
            Self {
                descriptor: AgentDescriptor::new(kind),
                failures_left: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl AnalysisAgent for FlakyAgent {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn process(&self, _input: AgentInput) -> Result<AgentResult> {
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::AgentExecution {
                    kind: self.descriptor.kind,
                    message: "transient failure".to_string(),
                });
            }
            let mut data = Map::new();
            data.insert("recovered".to_string(), json!(true));
            Ok(AgentResult::ok(data, 0.8))
        }
    }

    fn fast_config() -> OrchestrationConfig {
        OrchestrationConfig {
            agent_timeout_ms: 10, // keeps the flat retry delay short in tests
            max_retries: 2,
            ..OrchestrationConfig::default()
        }
    }

    fn orchestrator_with<A: AnalysisAgent>(agents: Vec<A>) -> Orchestrator {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(Arc::new(agent));
        }
        let tracker = Arc::new(StatusTracker::new(3_600));
        Orchestrator::new(registry, fast_config(), tracker)
    }

    #[tokio::test]
    async fn test_happy_path_aggregates_agent_data() {
        let orchestrator = orchestrator_with(vec![StaticAgent::new(
            AnalysisKind::Sentiment,
            "score",
            json!(0.8),
        )]);
        orchestrator.tracker().create("a1").await;

        let request = AnalysisRequest::new("p1").with_types(["sentiment"]);
        let response = orchestrator.run_analysis("a1", request).await.unwrap();

        assert!(response.success);
        assert_eq!(response.project_id, "p1");
        assert_eq!(response.results["sentiment"]["score"], json!(0.8));
        assert_eq!(response.metadata.agents_used, vec![AnalysisKind::Sentiment]);

        let status = orchestrator.tracker().get("a1").await.unwrap();
        assert_eq!(status.status, AnalysisState::Completed);
        assert!(status.results.is_some());
    }

    #[tokio::test]
    async fn test_unmapped_kinds_reject_with_no_agents() {
        let orchestrator = orchestrator_with(Vec::<StaticAgent>::new());
        orchestrator.tracker().create("a1").await;

        let request = AnalysisRequest::new("p1").with_types(["unknown_kind"]);
        let result = orchestrator.run_analysis("a1", request).await;

        assert!(matches!(result, Err(Error::NoAgentsAvailable)));

        let status = orchestrator.tracker().get("a1").await.unwrap();
        assert_eq!(status.status, AnalysisState::Failed);
        assert!(!status.error.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_budget_honored_exactly() {
        // Fails max_retries times, succeeds on the final allowed attempt
        let orchestrator =
            orchestrator_with(vec![FlakyAgent::new(AnalysisKind::Market, 2)]);
        orchestrator.tracker().create("a1").await;

        let request = AnalysisRequest::new("p1").with_types(["market"]);
        let response = orchestrator.run_analysis("a1", request).await.unwrap();

        assert!(response.success);
        assert_eq!(response.results["market"]["recovered"], json!(true));
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_whole_run() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(StaticAgent::new(
            AnalysisKind::Sentiment,
            "score",
            json!(0.8),
        )));
        registry.register(Arc::new(FlakyAgent::new(AnalysisKind::Market, 3)));
        let tracker = Arc::new(StatusTracker::new(3_600));
        let orchestrator = Orchestrator::new(registry, fast_config(), tracker);
        orchestrator.tracker().create("a1").await;

        let request = AnalysisRequest::new("p1").with_types(["sentiment", "market"]);
        let result = orchestrator.run_analysis("a1", request).await;

        // The sibling succeeded, the run still fails
        assert!(matches!(
            result,
            Err(Error::RetriesExhausted {
                kind: AnalysisKind::Market,
                attempts: 3,
                ..
            })
        ));

        let status = orchestrator.tracker().get("a1").await.unwrap();
        assert_eq!(status.status, AnalysisState::Failed);
    }

    #[tokio::test]
    async fn test_run_records_to_store() {
        let store = Arc::new(Mutex::new(ExecutionStore::in_memory().unwrap()));
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(StaticAgent::new(
            AnalysisKind::Pricing,
            "currency",
            json!("usd"),
        )));
        let tracker = Arc::new(StatusTracker::new(3_600));
        let orchestrator =
            Orchestrator::new(registry, fast_config(), tracker).with_store(Arc::clone(&store));
        orchestrator.tracker().create("a1").await;

        let request = AnalysisRequest::new("p1").with_types(["pricing"]);
        orchestrator.run_analysis("a1", request).await.unwrap();

        let store = store.lock().unwrap();
        let record = store.get_analysis("a1").unwrap().unwrap();
        assert_eq!(record.status, "completed");
        assert_eq!(store.agent_execution_count("a1").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_completed_aggregate_is_cached() {
        let orchestrator = orchestrator_with(vec![StaticAgent::new(
            AnalysisKind::Trends,
            "topics",
            json!([]),
        )]);
        orchestrator.tracker().create("a1").await;

        let request = AnalysisRequest::new("p1").with_types(["trends"]);
        orchestrator.run_analysis("a1", request).await.unwrap();

        let cached = orchestrator.cached("a1").await.unwrap();
        assert!(cached.contains_key("trends"));
    }

    #[tokio::test]
    async fn test_validation_error_never_dispatches() {
        let orchestrator = orchestrator_with(vec![StaticAgent::new(
            AnalysisKind::Sentiment,
            "score",
            json!(0.8),
        )]);
        orchestrator.tracker().create("a1").await;

        let request = AnalysisRequest::new("").with_types(["sentiment"]);
        let result = orchestrator.run_analysis("a1", request).await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
