//! Result aggregation
//!
//! Combines settled agent results into one aggregate map keyed by
//! agent kind. `Weighted` and `Confidence` are declared strategies but
//! deliberately behave identically to `Simple`: no weighting formula
//! is specified, so they pass through unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::{AgentResult, AnalysisKind};

/// Strategy for combining per-agent results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    /// Copy each successful agent's data under its kind key
    #[default]
    Simple,
    /// Declared; currently identical to `Simple`
    Weighted,
    /// Declared; currently identical to `Simple`
    Confidence,
}

/// Build the aggregate map for a set of settled results
pub fn aggregate(
    strategy: AggregationStrategy,
    results: &[(AnalysisKind, AgentResult)],
) -> Map<String, Value> {
    match strategy {
        AggregationStrategy::Simple
        | AggregationStrategy::Weighted
        | AggregationStrategy::Confidence => simple(results),
    }
}

/// Failed entries are skipped. Under the all-or-nothing retry contract
/// a failed entry never reaches aggregation; the guard stays anyway.
fn simple(results: &[(AnalysisKind, AgentResult)]) -> Map<String, Value> {
    let mut aggregate = Map::new();

    for (kind, result) in results {
        if !result.success {
            continue;
        }
        aggregate.insert(kind.to_string(), Value::Object(result.data.clone()));
    }

    aggregate
}
