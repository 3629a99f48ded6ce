//! Built-in analysis agents
//!
//! Simulated analyzers, one per kind. Each computes a small
//! fixed-shape payload after a short non-blocking delay so that
//! concurrently dispatched agents genuinely overlap on the runtime.

use async_trait::async_trait;
use serde_json::{Map, json};
use std::time::Duration;
use tracing::debug;

use super::registry::AgentRegistry;
use super::types::{
    AgentDescriptor, AgentInput, AgentPriority, AgentResult, AnalysisAgent, AnalysisKind,
};
use crate::Result;
use std::sync::Arc;

const SIMULATED_WORK_MS: u64 = 25;

/// Sentiment analysis over project feedback
pub struct SentimentAgent {
    descriptor: AgentDescriptor,
}

impl SentimentAgent {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(AnalysisKind::Sentiment)
                .with_priority(AgentPriority::High),
        }
    }
}

impl Default for SentimentAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisAgent for SentimentAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: AgentInput) -> Result<AgentResult> {
        debug!("Running sentiment analysis for project {}", input.project_id);
        tokio::time::sleep(Duration::from_millis(SIMULATED_WORK_MS)).await;

        let mut data = Map::new();
        data.insert("score".to_string(), json!(0.8));
        data.insert("label".to_string(), json!("positive"));
        data.insert("sample_size".to_string(), json!(412));

        Ok(AgentResult::ok(data, 0.87).with_metadata("source", json!("feedback_corpus")))
    }
}

/// Market segment analysis
pub struct MarketAgent {
    descriptor: AgentDescriptor,
}

impl MarketAgent {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(AnalysisKind::Market),
        }
    }
}

impl Default for MarketAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisAgent for MarketAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: AgentInput) -> Result<AgentResult> {
        debug!("Running market analysis for project {}", input.project_id);
        tokio::time::sleep(Duration::from_millis(SIMULATED_WORK_MS)).await;

        let mut data = Map::new();
        data.insert("segment_size_usd".to_string(), json!(1_250_000_000u64));
        data.insert("yoy_growth".to_string(), json!(0.12));
        data.insert(
            "competitors".to_string(),
            json!(["acme", "globex", "initech"]),
        );

        Ok(AgentResult::ok(data, 0.74))
    }
}

/// Pricing tier analysis
pub struct PricingAgent {
    descriptor: AgentDescriptor,
}

impl PricingAgent {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(AnalysisKind::Pricing),
        }
    }
}

impl Default for PricingAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisAgent for PricingAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: AgentInput) -> Result<AgentResult> {
        debug!("Running pricing analysis for project {}", input.project_id);
        tokio::time::sleep(Duration::from_millis(SIMULATED_WORK_MS)).await;

        let currency = input
            .query_params
            .get("currency")
            .and_then(|v| v.as_str())
            .unwrap_or("usd");

        let mut data = Map::new();
        data.insert("currency".to_string(), json!(currency));
        data.insert(
            "suggested_tiers".to_string(),
            json!([
                {"name": "starter", "monthly": 29},
                {"name": "team", "monthly": 99},
                {"name": "enterprise", "monthly": 499},
            ]),
        );

        Ok(AgentResult::ok(data, 0.69))
    }
}

/// Trending-topic analysis
pub struct TrendsAgent {
    descriptor: AgentDescriptor,
}

impl TrendsAgent {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new(AnalysisKind::Trends)
                .with_priority(AgentPriority::Low),
        }
    }
}

impl Default for TrendsAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisAgent for TrendsAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn process(&self, input: AgentInput) -> Result<AgentResult> {
        debug!("Running trends analysis for project {}", input.project_id);
        tokio::time::sleep(Duration::from_millis(SIMULATED_WORK_MS)).await;

        let mut data = Map::new();
        data.insert(
            "topics".to_string(),
            json!([
                {"topic": "self-serve onboarding", "momentum": 0.61},
                {"topic": "usage-based billing", "momentum": 0.44},
            ]),
        );

        Ok(AgentResult::ok(data, 0.71))
    }
}

/// Register every built-in agent on the registry
pub fn register_builtin_agents(registry: &mut AgentRegistry) {
    registry.register(Arc::new(SentimentAgent::new()));
    registry.register(Arc::new(MarketAgent::new()));
    registry.register(Arc::new(PricingAgent::new()));
    registry.register(Arc::new(TrendsAgent::new()));
}
