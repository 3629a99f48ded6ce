//! Analysis status tracking
//!
//! In-memory map from analysis id to the latest known run status.
//! Entries are created at submission, mutated by the orchestrator as
//! agents complete, and evicted a fixed retention window after
//! reaching a terminal state. A caller polling after eviction gets
//! not-found, indistinguishable from an id that never existed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::agents::AnalysisKind;
use crate::{Error, Result};

/// Run state, terminal once completed or failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Mutable status record for one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub analysis_id: String,
    pub status: AnalysisState,
    /// Fraction of resolved agents finished, in [0, 1]
    pub progress: f64,
    /// Kind tags already finished
    pub completed_types: Vec<AnalysisKind>,
    /// Kind tag most recently put in flight, if any
    pub current_type: Option<AnalysisKind>,
    /// Aggregate payload once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Map<String, Value>>,
    /// Wall-clock seconds of the whole run, set at terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
}

impl AnalysisStatus {
    fn new(analysis_id: &str) -> Self {
        Self {
            analysis_id: analysis_id.to_string(),
            status: AnalysisState::Pending,
            progress: 0.0,
            completed_types: Vec::new(),
            current_type: None,
            results: None,
            execution_time: None,
            error: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

struct TrackedStatus {
    status: AnalysisStatus,
    /// Set when the entry reaches a terminal state
    terminal_at: Option<Instant>,
}

/// Tracker for in-flight and recently finished runs
///
/// Writes arrive from concurrently settling agent tasks; the inner
/// lock keeps single-key updates atomic.
pub struct StatusTracker {
    entries: RwLock<HashMap<String, TrackedStatus>>,
    retention: Duration,
}

impl StatusTracker {
    pub fn new(retention_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention: Duration::from_secs(retention_secs),
        }
    }

    /// Create a pending entry for a new analysis id
    pub async fn create(&self, analysis_id: &str) {
        let mut entries = self.entries.write().await;
        entries.insert(
            analysis_id.to_string(),
            TrackedStatus {
                status: AnalysisStatus::new(analysis_id),
                terminal_at: None,
            },
        );
    }

    /// Move a pending entry into processing
    pub async fn mark_processing(&self, analysis_id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(tracked) = entries.get_mut(analysis_id) {
            if !tracked.status.status.is_terminal() {
                tracked.status.status = AnalysisState::Processing;
            }
        }
    }

    /// Record that an agent was put in flight
    pub async fn agent_started(&self, analysis_id: &str, kind: AnalysisKind) {
        let mut entries = self.entries.write().await;
        if let Some(tracked) = entries.get_mut(analysis_id) {
            if !tracked.status.status.is_terminal() {
                tracked.status.current_type = Some(kind);
            }
        }
    }

    /// Record one agent's completion and the updated progress fraction
    pub async fn agent_completed(&self, analysis_id: &str, kind: AnalysisKind, progress: f64) {
        let mut entries = self.entries.write().await;
        if let Some(tracked) = entries.get_mut(analysis_id) {
            if !tracked.status.status.is_terminal() {
                tracked.status.completed_types.push(kind);
                tracked.status.progress = progress.clamp(0.0, 1.0);
                if tracked.status.current_type == Some(kind) {
                    tracked.status.current_type = None;
                }
            }
        }
    }

    /// Mark a run completed with its aggregate
    pub async fn complete(
        &self,
        analysis_id: &str,
        results: Map<String, Value>,
        execution_time: f64,
    ) {
        let mut entries = self.entries.write().await;
        if let Some(tracked) = entries.get_mut(analysis_id) {
            if tracked.status.status.is_terminal() {
                return;
            }
            tracked.status.status = AnalysisState::Completed;
            tracked.status.progress = 1.0;
            tracked.status.current_type = None;
            tracked.status.results = Some(results);
            tracked.status.execution_time = Some(execution_time);
            tracked.terminal_at = Some(Instant::now());
        }
    }

    /// Mark a run failed with its error message
    pub async fn fail(&self, analysis_id: &str, error: impl Into<String>) {
        let mut entries = self.entries.write().await;
        if let Some(tracked) = entries.get_mut(analysis_id) {
            if tracked.status.status.is_terminal() {
                return;
            }
            tracked.status.status = AnalysisState::Failed;
            tracked.status.current_type = None;
            tracked.status.error = Some(error.into());
            tracked.terminal_at = Some(Instant::now());
        }
    }

    /// Fetch the current status for an id.
    ///
    /// Entries past their retention window report not-found even when
    /// the sweep has not reclaimed them yet.
    pub async fn get(&self, analysis_id: &str) -> Result<AnalysisStatus> {
        let entries = self.entries.read().await;
        let tracked = entries
            .get(analysis_id)
            .ok_or_else(|| Error::StatusNotFound(analysis_id.to_string()))?;

        if let Some(terminal_at) = tracked.terminal_at {
            if terminal_at.elapsed() >= self.retention {
                return Err(Error::StatusNotFound(analysis_id.to_string()));
            }
        }

        Ok(tracked.status.clone())
    }

    /// Evict terminal entries older than the retention window
    pub async fn cleanup(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();

        entries.retain(|_, tracked| match tracked.terminal_at {
            Some(terminal_at) => terminal_at.elapsed() < self.retention,
            None => true,
        });

        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("Evicted {} expired status entries", evicted);
        }
        evicted
    }

    /// Number of tracked entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
