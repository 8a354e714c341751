//! Types shared by the retrieval/dedup/rank/budget cluster (C8–C12), kept
//! here so those crates can pass results between each other without a
//! dependency cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MemoryId;
use crate::memory::MemoryRecord;

/// Per-memory access bookkeeping maintained by the Access Tracker (C11) and
/// consumed by the Ranker's frequency term (C10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessMetadata {
    pub memory_id: Option<MemoryId>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_count: u64,
}

/// One candidate surfaced by the vector search, carried through
/// dedup → rank → budget, accumulating a rewritten `relevance_score` and
/// `rank` at each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub memory: MemoryRecord,
    pub similarity_score: f64,
    pub relevance_score: f64,
    pub rank: usize,
    pub access_metadata: Option<AccessMetadata>,
    /// Set by the Budget Manager (C12) once a result has been accounted
    /// for, possibly with truncated `memory.content`.
    pub budget_enforced: bool,
    /// Cached token count, set the first time the Budget Manager counts this
    /// result so repeated passes (estimate, then enforce) don't re-tokenize.
    pub token_count: Option<usize>,
}

impl RetrievalResult {
    pub fn new(memory: MemoryRecord, similarity_score: f64) -> Self {
        let relevance_score = similarity_score;
        Self {
            memory,
            similarity_score,
            relevance_score,
            rank: 0,
            access_metadata: None,
            budget_enforced: false,
            token_count: None,
        }
    }
}

/// Weights for the Ranker's composite score (`spec.md` §4.9). Must sum to a
/// positive total and every component must be non-negative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub similarity: f64,
    pub confidence: f64,
    pub recency: f64,
    pub frequency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            similarity: 0.40,
            confidence: 0.25,
            recency: 0.20,
            frequency: 0.15,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), String> {
        let components = [self.similarity, self.confidence, self.recency, self.frequency];
        if components.iter().any(|w| *w < 0.0) {
            return Err("score weights must be non-negative".to_string());
        }
        Ok(())
    }
}

/// Query parameters accepted by the Retrieval Service (`spec.md` §4.7).
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub text: String,
    pub top_k: usize,
    pub min_similarity: f64,
    pub min_confidence: f64,
    pub memory_types: Option<Vec<crate::memory::MemoryType>>,
    pub precomputed_embedding: Option<Vec<f32>>,
}

impl RetrievalQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: 10,
            min_similarity: 0.0,
            min_confidence: 0.0,
            memory_types: None,
            precomputed_embedding: None,
        }
    }
}

/// Latency breakdown reported alongside a `RetrievalResponse`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RetrievalLatencies {
    pub embedding_ms: f64,
    pub search_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub results: Vec<RetrievalResult>,
    pub latencies: RetrievalLatencies,
    pub searched_count: usize,
    pub matched_count: usize,
    pub deduplicated_count: usize,
}
