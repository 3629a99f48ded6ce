//! Aggregate result cache
//!
//! Stores the aggregate of a completed run keyed by analysis id, with
//! an expiry stamp of insertion time + TTL. Expiry is passive: entries
//! are checked for staleness on read and never swept, so the map grows
//! for as long as the process runs under sustained load.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

struct CacheEntry {
    results: Map<String, Value>,
    expires_at: Instant,
}

/// In-memory cache for analysis aggregates
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    enabled: bool,
}

impl ResultCache {
    pub fn new(enabled: bool, ttl_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
            enabled,
        }
    }

    /// Store an aggregate under an analysis id
    pub async fn put(&self, analysis_id: &str, results: Map<String, Value>) {
        if !self.enabled {
            return;
        }

        let entry = CacheEntry {
            results,
            expires_at: Instant::now() + self.ttl,
        };

        let mut entries = self.entries.write().await;
        entries.insert(analysis_id.to_string(), entry);
        debug!("Cached aggregate for analysis {}", analysis_id);
    }

    /// Fetch a cached aggregate, treating expired entries as absent
    pub async fn get(&self, analysis_id: &str) -> Option<Map<String, Value>> {
        if !self.enabled {
            return None;
        }

        let entries = self.entries.read().await;
        let entry = entries.get(analysis_id)?;

        if entry.expires_at <= Instant::now() {
            // Stale entries stay in place; only the read is refused
            return None;
        }

        Some(entry.results.clone())
    }

    /// Number of entries currently held, stale ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
