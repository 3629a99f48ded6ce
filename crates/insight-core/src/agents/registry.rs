//! Agent registry
//!
//! Holds the kind -> agent mapping the orchestrator resolves requests
//! against. The registry is populated at startup, before any request
//! is served, and is read-only during dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::runner::AgentRunner;
use super::types::{AgentDescriptor, AnalysisAgent, AnalysisKind};

/// Registry of agents keyed by analysis kind
///
/// A kind maps to at most one agent at any time; re-registration
/// overwrites the previous entry.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<AnalysisKind, Arc<AgentRunner>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Register an agent under its declared kind
    pub fn register(&mut self, agent: Arc<dyn AnalysisAgent>) {
        let kind = agent.descriptor().kind;
        info!("Registering agent: {}", kind);

        if self.agents.insert(kind, Arc::new(AgentRunner::new(agent))).is_some() {
            debug!("Replaced previously registered agent for {}", kind);
        }
    }

    /// Get the runner for a kind
    pub fn get(&self, kind: AnalysisKind) -> Option<Arc<AgentRunner>> {
        self.agents.get(&kind).cloned()
    }

    /// Resolve requested kind tags to registered runners.
    ///
    /// Tags that parse to no known kind, map to no registered agent,
    /// or map to a disabled agent are dropped silently.
    pub fn resolve(&self, requested: &[String]) -> Vec<Arc<AgentRunner>> {
        let mut resolved = Vec::new();

        for tag in requested {
            let Ok(kind) = tag.parse::<AnalysisKind>() else {
                debug!("Dropping unknown analysis kind tag: {}", tag);
                continue;
            };

            match self.agents.get(&kind) {
                Some(runner) if runner.descriptor().enabled => {
                    // A kind requested twice still resolves to one run
                    if !resolved.iter().any(|r: &Arc<AgentRunner>| r.kind() == kind) {
                        resolved.push(Arc::clone(runner));
                    }
                }
                Some(_) => debug!("Dropping disabled agent for kind: {}", kind),
                None => debug!("No registered agent for kind: {}", kind),
            }
        }

        resolved
    }

    /// Descriptors of all registered agents
    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.agents.values().map(|r| r.descriptor().clone()).collect()
    }

    /// All registered kinds
    pub fn kinds(&self) -> Vec<AnalysisKind> {
        self.agents.keys().copied().collect()
    }

    /// Number of registered agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
