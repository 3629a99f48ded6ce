//! Agent types and trait definitions
//!
//! Defines the core types for the analysis agent architecture:
//! - AnalysisAgent trait: Interface for concrete analyzers
//! - AgentDescriptor: Identity and capability declaration
//! - AgentResult: Result from a single agent invocation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::Result;

/// Enumerated analysis kind tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Sentiment,
    Market,
    Pricing,
    Trends,
}

impl AnalysisKind {
    /// All known kinds, in declaration order
    pub fn all() -> &'static [AnalysisKind] {
        &[Self::Sentiment, Self::Market, Self::Pricing, Self::Trends]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sentiment => "sentiment",
            Self::Market => "market",
            Self::Pricing => "pricing",
            Self::Trends => "trends",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sentiment" => Ok(Self::Sentiment),
            "market" => Ok(Self::Market),
            "pricing" => Ok(Self::Pricing),
            "trends" => Ok(Self::Trends),
            other => Err(crate::Error::Validation(format!(
                "unknown analysis kind: {other}"
            ))),
        }
    }
}

/// Priority level for an agent
///
/// Carried as informational metadata only: dispatch neither reorders
/// nor throttles on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Identity of a registered agent
///
/// Created at process start from static configuration, immutable
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Kind tag this agent serves
    pub kind: AnalysisKind,
    /// Kinds this agent claims to support
    pub capabilities: Vec<AnalysisKind>,
    /// Priority level (informational)
    pub priority: AgentPriority,
    /// Whether the agent participates in resolution
    pub enabled: bool,
}

impl AgentDescriptor {
    /// Create a descriptor serving a single kind
    pub fn new(kind: AnalysisKind) -> Self {
        Self {
            kind,
            capabilities: vec![kind],
            priority: AgentPriority::default(),
            enabled: true,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: AgentPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Extend the capability set
    pub fn with_capabilities(mut self, capabilities: Vec<AnalysisKind>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Pure lookup against the declared capability set
    pub fn has_capability(&self, kind: AnalysisKind) -> bool {
        self.capabilities.contains(&kind)
    }
}

/// Input handed to an agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
    /// Project the analysis is about
    pub project_id: String,
    /// Open key-value query parameters from the caller
    #[serde(default)]
    pub query_params: Map<String, Value>,
    /// Caller-requested confidence floor
    pub confidence_threshold: f64,
}

impl AgentInput {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            query_params: Map::new(),
            confidence_threshold: 0.7,
        }
    }
}

/// Result from a single agent invocation
///
/// Invariant: `success == false` implies `data` is empty and `error`
/// is present. Use the constructors below rather than building the
/// struct by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Whether the invocation succeeded
    pub success: bool,
    /// Open key-value payload
    pub data: Map<String, Value>,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Wall-clock seconds around the invocation
    pub execution_time: f64,
    /// Open key-value metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Error message when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    /// Create a successful result
    pub fn ok(data: Map<String, Value>, confidence: f64) -> Self {
        Self {
            success: true,
            data,
            confidence,
            execution_time: 0.0,
            metadata: Map::new(),
            error: None,
        }
    }

    /// Create a failed result
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Map::new(),
            confidence: 0.0,
            execution_time: 0.0,
            metadata: Map::new(),
            error: Some(error.into()),
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Analysis agent trait
///
/// `process` computes the result for one analysis kind however it
/// needs to. It must not mutate shared orchestrator state; everything
/// it needs arrives through the input.
#[async_trait]
pub trait AnalysisAgent: Send + Sync + 'static {
    /// The agent's identity and capability declaration
    fn descriptor(&self) -> &AgentDescriptor;

    /// Compute the result for one invocation
    async fn process(&self, input: AgentInput) -> Result<AgentResult>;

    /// Pure lookup against the declared capability set
    fn has_capability(&self, kind: AnalysisKind) -> bool {
        self.descriptor().has_capability(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trip() {
        for kind in AnalysisKind::all() {
            let parsed: AnalysisKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn test_kind_unknown_tag() {
        assert!("unknown_kind".parse::<AnalysisKind>().is_err());
    }

    #[test]
    fn test_descriptor_capability_lookup() {
        let descriptor = AgentDescriptor::new(AnalysisKind::Sentiment)
            .with_capabilities(vec![AnalysisKind::Sentiment, AnalysisKind::Trends]);

        assert!(descriptor.has_capability(AnalysisKind::Sentiment));
        assert!(descriptor.has_capability(AnalysisKind::Trends));
        assert!(!descriptor.has_capability(AnalysisKind::Pricing));
    }

    #[test]
    fn test_result_ok() {
        let mut data = Map::new();
        data.insert("score".to_string(), json!(0.8));

        let result = AgentResult::ok(data, 0.9);
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.data.get("score"), Some(&json!(0.8)));
    }

    #[test]
    fn test_result_failure_invariant() {
        let result = AgentResult::failure("boom");
        assert!(!result.success);
        assert!(result.data.is_empty());
        assert_eq!(result.error.as_deref(), Some("boom"));
    }
}
