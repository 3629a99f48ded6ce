//! エラー型定義 (insight-api)
//!
//! すべてのエラーは統一されたエンベロープ
//! `{error, code, details?}` として返されます。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// insight-api のエラー型
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("No agents available for the requested analysis types")]
    NoAgentsAvailable,

    #[error("Agent failure: {0}")]
    AgentFailure(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Too many requests")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Uniform error envelope returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::NoAgentsAvailable => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::WorkflowNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::AgentFailure(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            Self::NoAgentsAvailable => "NO_AGENTS_AVAILABLE",
            Self::AgentFailure(_) => "AGENT_FAILURE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<insight_core::Error> for ApiError {
    fn from(e: insight_core::Error) -> Self {
        use insight_core::Error as Core;
        match e {
            Core::Validation(msg) => Self::Validation(msg),
            Core::NoAgentsAvailable => Self::NoAgentsAvailable,
            Core::StatusNotFound(id) => Self::NotFound(id),
            Core::WorkflowNotFound(name) => Self::WorkflowNotFound(name),
            Core::RetriesExhausted { .. }
            | Core::AgentTimeout { .. }
            | Core::AgentExecution { .. }
            | Core::AgentBusy(_) => Self::AgentFailure(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            error: self.to_string(),
            code: self.code().to_string(),
            details: None,
        };
        (self.status(), Json(envelope)).into_response()
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, ApiError>;
