//! HTTP API handlers
//!
//! Request handlers for analysis submission, status polling, workflow
//! invocation and agent introspection.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use insight_core::{AgentDescriptor, AnalysisRequest, AnalysisStatus, WorkflowContext, WorkflowResult};

use crate::error::Result;
use crate::server::AppState;

// ============================================================================
// Response types
// ============================================================================

/// Immediate reply for a fire-and-forget submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub results: SubmitResults,
    pub metadata: SubmitMetadata,
}

#[derive(Debug, Serialize)]
pub struct SubmitResults {
    pub analysis_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitMetadata {
    pub status: &'static str,
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Submit an analysis request.
///
/// With `streaming: true` the call blocks until the run settles and
/// returns the full response. Otherwise the run continues detached in
/// the background — the handler keeps no reference to the task and the
/// outcome is observable only through the status endpoint.
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Response> {
    request.validate()?;

    let analysis_id = uuid::Uuid::new_v4().to_string();
    state.tracker.create(&analysis_id).await;
    debug!(
        "Accepted analysis {} for project {} (streaming: {})",
        analysis_id, request.project_id, request.streaming
    );

    if request.streaming {
        let response = state.orchestrator.run_analysis(&analysis_id, request).await?;
        return Ok(Json(response).into_response());
    }

    let orchestrator = Arc::clone(&state.orchestrator);
    let id = analysis_id.clone();
    tokio::spawn(async move {
        // Terminal state lands in the tracker either way; the error is
        // only logged here.
        if let Err(e) = orchestrator.run_analysis(&id, request).await {
            error!("Background analysis {} failed: {}", id, e);
        }
    });

    let body = SubmitResponse {
        success: true,
        results: SubmitResults { analysis_id },
        metadata: SubmitMetadata {
            status: "processing",
        },
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// Poll the status of a submitted analysis
pub async fn analysis_status(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> Result<Json<AnalysisStatus>> {
    let status = state.tracker.get(&analysis_id).await?;
    Ok(Json(status))
}

/// Invoke a named workflow with a free-form input payload
pub async fn run_workflow(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(input): Json<Value>,
) -> Result<Json<WorkflowResult>> {
    info!("Running workflow: {}", name);

    let ctx = WorkflowContext::new("http-api", input)
        .with_orchestrator(Arc::clone(&state.orchestrator));
    let result = state.workflows.run(&name, ctx).await?;

    Ok(Json(result))
}

/// List registered agents and their descriptors
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentDescriptor>> {
    Json(state.orchestrator.registry().descriptors())
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use insight_core::agents::{AgentRegistry, register_builtin_agents};
    use insight_core::workflow::CustomerSupportWorkflow;
    use insight_core::{
        Config, Orchestrator, OrchestrationConfig, StatusTracker, WorkflowRegistry,
    };

    use crate::middleware::rate_limit::RateLimiter;
    use crate::routes::routes;
    use crate::server::AppState;

    use super::*;

    fn test_router() -> Router {
        let mut registry = AgentRegistry::new();
        register_builtin_agents(&mut registry);

        let tracker = Arc::new(StatusTracker::new(3_600));
        let config = OrchestrationConfig {
            agent_timeout_ms: 10,
            ..OrchestrationConfig::default()
        };
        let orchestrator = Arc::new(Orchestrator::new(registry, config, Arc::clone(&tracker)));

        let mut workflows = WorkflowRegistry::new();
        workflows.register(Arc::new(CustomerSupportWorkflow::new()));

        let state = AppState {
            config: Arc::new(Config::default()),
            orchestrator,
            workflows: Arc::new(workflows),
            tracker,
            limiter: Arc::new(RateLimiter::new()),
        };

        routes().with_state(state)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_streaming_analyze_returns_full_response() {
        let router = test_router();

        let request = post_json(
            "/api/analyze",
            json!({
                "project_id": "p1",
                "analysis_types": ["sentiment"],
                "streaming": true,
            }),
        );
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response.into_response()).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["results"]["sentiment"]["score"], json!(0.8));
    }

    #[tokio::test]
    async fn test_background_analyze_completes_via_status() {
        let router = test_router();

        let request = post_json(
            "/api/analyze",
            json!({
                "project_id": "p1",
                "analysis_types": ["sentiment"],
                "streaming": false,
            }),
        );
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = body_json(response.into_response()).await;
        assert_eq!(body["metadata"]["status"], json!("processing"));
        let analysis_id = body["results"]["analysis_id"].as_str().unwrap().to_string();

        // Poll until the detached run settles
        let mut status = json!(null);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;

            let request = Request::builder()
                .uri(format!("/api/analyze/status/{analysis_id}"))
                .body(Body::empty())
                .unwrap();
            let response = router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            status = body_json(response.into_response()).await;
            if status["status"] == json!("completed") {
                break;
            }
        }

        assert_eq!(status["status"], json!("completed"));
        assert_eq!(status["results"]["sentiment"]["score"], json!(0.8));
    }

    #[tokio::test]
    async fn test_analyze_unknown_kind_only() {
        let router = test_router();

        let request = post_json(
            "/api/analyze",
            json!({
                "project_id": "p1",
                "analysis_types": ["unknown_kind"],
                "streaming": true,
            }),
        );
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response.into_response()).await;
        assert_eq!(body["code"], json!("NO_AGENTS_AVAILABLE"));
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_project() {
        let router = test_router();

        let request = post_json(
            "/api/analyze",
            json!({"project_id": "", "analysis_types": ["sentiment"]}),
        );
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response.into_response()).await;
        assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    }

    #[tokio::test]
    async fn test_status_unknown_id() {
        let router = test_router();

        let request = Request::builder()
            .uri("/api/analyze/status/nope")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response.into_response()).await;
        assert_eq!(body["code"], json!("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_workflow_roundtrip() {
        let router = test_router();

        let request = post_json(
            "/api/workflow/customer_support",
            json!({"message": "refund my invoice please"}),
        );
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response.into_response()).await;
        assert_eq!(body["status"], json!("completed"));
        assert_eq!(body["output"]["category"], json!("billing"));
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_404() {
        let router = test_router();

        let request = post_json("/api/workflow/nope", json!({}));
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response.into_response()).await;
        assert_eq!(body["code"], json!("WORKFLOW_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_list_agents() {
        let router = test_router();

        let request = Request::builder()
            .uri("/api/agents")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response.into_response()).await;
        assert_eq!(body.as_array().unwrap().len(), 4);
    }
}
