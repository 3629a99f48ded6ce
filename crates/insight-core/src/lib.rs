//! insight-core: Insight Gateway Core Library
//!
//! 分析エージェントのオーケストレーション、ワークフロー実行、
//! ステータス追跡、実行履歴の永続化のコア機能を提供します。

pub mod agents;
pub mod cache;
pub mod config;
pub mod error;
pub mod orchestration;
pub mod status;
pub mod storage;
pub mod workflow;

pub use agents::{
    AgentDescriptor, AgentInput, AgentPriority, AgentRegistry, AgentResult, AgentRunner,
    AnalysisAgent, AnalysisKind,
};
pub use cache::ResultCache;
pub use config::{Config, OrchestrationConfig, ServerConfig, StatusConfig, StorageConfig};
pub use error::{Error, Result};
pub use orchestration::{AggregationStrategy, AnalysisRequest, AnalysisResponse, Orchestrator};
pub use status::{AnalysisState, AnalysisStatus, StatusTracker};
pub use storage::ExecutionStore;
pub use workflow::{Workflow, WorkflowContext, WorkflowRegistry, WorkflowResult, WorkflowStatus};
