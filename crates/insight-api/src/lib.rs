//! insight-api: HTTP API for Insight Gateway
//!
//! Provides the REST endpoints for submitting analyses, polling run
//! status and invoking workflows. Built with axum for async HTTP
//! handling.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{AppState, start_server};
