//! Agent invocation wrapper
//!
//! Wraps a concrete agent with the run-level contract:
//! - a single in-flight slot (second caller fails fast with busy)
//! - a timeout race around `process`
//! - mapping of every `process` failure into a failed AgentResult
//!
//! The slot is an atomic compare-and-swap, not a plain flag read, so
//! two concurrent callers can never both believe they acquired it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::types::{AgentInput, AgentResult, AnalysisAgent, AnalysisKind};
use crate::{Error, Result};

/// Exclusive-use wrapper around one agent instance
pub struct AgentRunner {
    agent: Arc<dyn AnalysisAgent>,
    busy: AtomicBool,
}

/// Releases the in-flight slot when the run settles, timeout included.
struct SlotGuard<'a>(&'a AtomicBool);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AgentRunner {
    pub fn new(agent: Arc<dyn AnalysisAgent>) -> Self {
        Self {
            agent,
            busy: AtomicBool::new(false),
        }
    }

    /// Kind tag of the wrapped agent
    pub fn kind(&self) -> AnalysisKind {
        self.agent.descriptor().kind
    }

    /// Descriptor of the wrapped agent
    pub fn descriptor(&self) -> &super::types::AgentDescriptor {
        self.agent.descriptor()
    }

    /// Whether a run is currently in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run the agent once with a timeout.
    ///
    /// Returns `Err(AgentBusy)` without waiting when a prior run has
    /// not settled yet. Every other failure mode (timeout, error or
    /// panic inside `process`) settles as a failed `AgentResult`.
    ///
    /// On timeout the underlying `process` call is abandoned, not
    /// cancelled: it keeps running on its spawned task and its
    /// eventual result is discarded.
    pub async fn run(&self, input: AgentInput, timeout_ms: u64) -> Result<AgentResult> {
        let kind = self.kind();

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AgentBusy(kind));
        }
        let _slot = SlotGuard(&self.busy);

        let started = Instant::now();
        let agent = Arc::clone(&self.agent);
        let handle = tokio::spawn(async move { agent.process(input).await });

        let mut result = match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await
        {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => {
                warn!("Agent {} failed: {}", kind, e);
                AgentResult::failure(e.to_string())
            }
            Ok(Err(join_err)) => {
                warn!("Agent {} task aborted: {}", kind, join_err);
                AgentResult::failure(
                    Error::AgentExecution {
                        kind,
                        message: join_err.to_string(),
                    }
                    .to_string(),
                )
            }
            Err(_) => {
                debug!("Agent {} timed out after {}ms, abandoning task", kind, timeout_ms);
                AgentResult::failure(Error::AgentTimeout { kind, timeout_ms }.to_string())
            }
        };

        result.execution_time = started.elapsed().as_secs_f64();
        Ok(result)
    }
}
