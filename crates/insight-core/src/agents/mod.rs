//! Analysis agents
//!
//! An agent is a single unit of work for one analysis kind. The
//! orchestrator resolves requested kinds against the registry and runs
//! each agent through its runner, which enforces the single in-flight
//! slot and the invocation timeout.

pub mod builtin;
pub mod registry;
pub mod runner;
pub mod types;

pub use builtin::{MarketAgent, PricingAgent, SentimentAgent, TrendsAgent, register_builtin_agents};
pub use registry::AgentRegistry;
pub use runner::AgentRunner;
pub use types::{AgentDescriptor, AgentInput, AgentPriority, AgentResult, AnalysisAgent, AnalysisKind};
