//! Analysis request and response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::{AgentPriority, AnalysisKind};
use crate::{Error, Result};

use super::aggregate::AggregationStrategy;

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_timeout_secs() -> u64 {
    60
}

/// Caller-supplied analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Project the analysis is about
    pub project_id: String,

    /// Requested kind tags. Absent means "use the configured default
    /// set"; an explicitly empty list is rejected.
    #[serde(default)]
    pub analysis_types: Option<Vec<String>>,

    /// Open key-value parameters forwarded to every agent
    #[serde(default)]
    pub query_params: Map<String, Value>,

    /// Confidence floor in [0, 1]
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Request priority (informational)
    #[serde(default)]
    pub priority: AgentPriority,

    /// Shared per-agent timeout for this run
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Synchronous vs. fire-and-forget execution
    #[serde(default)]
    pub streaming: bool,
}

impl AnalysisRequest {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            analysis_types: None,
            query_params: Map::new(),
            confidence_threshold: default_confidence_threshold(),
            priority: AgentPriority::default(),
            timeout_secs: default_timeout_secs(),
            streaming: false,
        }
    }

    /// Set the requested kind tags
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analysis_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Set the per-agent timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Check boundary invariants
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(Error::Validation("project_id must not be empty".to_string()));
        }
        if let Some(types) = &self.analysis_types {
            if types.is_empty() {
                return Err(Error::Validation(
                    "analysis_types must not be empty".to_string(),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Validation(
                "confidence_threshold must be within [0, 1]".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Validation("timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Requested tags, with the configured default set substituted
    /// when the request names none
    pub fn effective_types(&self, defaults: &[String]) -> Vec<String> {
        match &self.analysis_types {
            Some(types) => types.clone(),
            None => defaults.to_vec(),
        }
    }
}

/// Metadata attached to a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Kinds that contributed to the aggregate
    pub agents_used: Vec<AnalysisKind>,
    /// Strategy the aggregate was built with
    pub aggregation: AggregationStrategy,
}

/// Terminal output of a successful orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub project_id: String,
    /// Requested tags, echoed
    pub analysis_types: Vec<String>,
    /// RFC 3339 completion timestamp
    pub timestamp: String,
    /// Wall-clock seconds of the whole run
    pub execution_time: f64,
    /// Aggregate keyed by agent kind
    pub results: Map<String, Value>,
    pub metadata: ResponseMetadata,
}
