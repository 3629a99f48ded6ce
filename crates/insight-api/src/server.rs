//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use insight_core::{Config, Orchestrator, StatusTracker, WorkflowRegistry};

use crate::middleware::{auth_middleware, rate_limit_middleware, RateLimiter};
use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub workflows: Arc<WorkflowRegistry>,
    pub tracker: Arc<StatusTracker>,
    pub limiter: Arc<RateLimiter>,
}

fn cors_layer(config: &Config) -> CorsLayer {
    match &config.server.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        _ => CorsLayer::permissive(),
    }
}

/// Start the HTTP API server
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let port = state.config.server.port;
    let cors = cors_layer(&state.config);

    let app = routes()
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("HTTP API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
