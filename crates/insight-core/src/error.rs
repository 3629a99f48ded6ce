//! Error types for insight-core

use thiserror::Error;

use crate::agents::AnalysisKind;

/// Main error type for insight-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No agents available for the requested analysis types")]
    NoAgentsAvailable,

    #[error("Agent {0} is busy with another request")]
    AgentBusy(AnalysisKind),

    #[error("Agent {kind} timed out after {timeout_ms}ms")]
    AgentTimeout { kind: AnalysisKind, timeout_ms: u64 },

    #[error("Agent {kind} execution failed: {message}")]
    AgentExecution { kind: AnalysisKind, message: String },

    #[error("Agent {kind} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        kind: AnalysisKind,
        attempts: u32,
        last_error: String,
    },

    #[error("Analysis not found: {0}")]
    StatusNotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for insight-core
pub type Result<T> = std::result::Result<T, Error>;
