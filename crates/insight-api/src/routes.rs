//! Route definitions
//!
//! Defines all HTTP API endpoints.

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{analysis_status, analyze, health, list_agents, run_workflow};
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Analysis submission and polling
        .route("/api/analyze", post(analyze))
        .route("/api/analyze/status/{analysis_id}", get(analysis_status))
        // Workflows
        .route("/api/workflow/{name}", post(run_workflow))
        // Agent introspection
        .route("/api/agents", get(list_agents))
}
