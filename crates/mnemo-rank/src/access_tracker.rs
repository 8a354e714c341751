//! Access Tracker (`spec.md` §4.10, "Access Tracker"). Ported from
//! `access_tracker.py`'s exception-swallowing pattern: access bookkeeping is
//! a ranking input, not a correctness requirement, so every failure here is
//! logged and absorbed rather than propagated to the retrieval path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mnemo_core::{AccessMetadata, MemoryId};
use mnemo_graph::GraphStore;
use tracing::warn;

pub struct AccessTracker {
    graph: Arc<GraphStore>,
}

impl AccessTracker {
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }

    /// Records an access to each memory. Returns the number of memories
    /// actually updated, or 0 on failure — never propagates an error.
    pub async fn record_access(&self, memory_ids: &[MemoryId], access_time: DateTime<Utc>) -> u32 {
        match self.graph.record_access(memory_ids, access_time).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(error = %e, "access tracking failed, continuing without");
                0
            }
        }
    }

    /// Convenience wrapper that stamps the current time.
    pub async fn record_access_now(&self, memory_ids: &[MemoryId]) -> u32 {
        self.record_access(memory_ids, Utc::now()).await
    }

    /// Fetches access metadata for ranking. Memories missing from the graph,
    /// or any query failure, resolve to a default (zero-count) entry rather
    /// than propagating — the Ranker must always have something to score.
    pub async fn get_access_metadata(&self, memory_ids: &[MemoryId]) -> HashMap<String, AccessMetadata> {
        let fetched = match self.graph.access_metadata(memory_ids).await {
            Ok(map) => map,
            Err(e) => {
                warn!(error = %e, "access metadata fetch failed, using defaults");
                HashMap::new()
            }
        };

        let mut result = HashMap::with_capacity(memory_ids.len());
        for id in memory_ids {
            let entry = fetched.get(id.as_str()).cloned().unwrap_or_else(|| AccessMetadata {
                memory_id: Some(id.clone()),
                last_accessed: None,
                access_count: 0,
            });
            result.insert(id.as_str().to_string(), entry);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metadata_has_zero_access_count() {
        let default = AccessMetadata::default();
        assert_eq!(default.access_count, 0);
        assert!(default.last_accessed.is_none());
    }
}
