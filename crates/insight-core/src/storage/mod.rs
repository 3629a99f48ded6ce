//! Execution history persistence

mod store;

pub use store::{AnalysisRecord, ExecutionStore, WorkflowRecord};
