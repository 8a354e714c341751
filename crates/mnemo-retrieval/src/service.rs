//! Retrieval Service (`spec.md` §4.7). Orchestration only: embeds the query,
//! asks the graph's vector index for candidates, hands them through the
//! Deduplicator and Ranker, then truncates to `top_k`. Grounded on
//! `retrieval_service.py::retrieve` for the pipeline shape and on
//! `skynet-gateway::app::AppState` for the thin, Arc-holding coordinator
//! pattern.

use std::sync::Arc;
use std::time::Instant;

use mnemo_core::{RetrievalLatencies, RetrievalQuery, RetrievalResponse, RetrievalResult, ScoreWeights};
use mnemo_embedding::EmbeddingClient;
use mnemo_graph::{GraphStore, VectorSearchParams};
use mnemo_rank::{AccessTracker, Ranker};
use tracing::instrument;

use crate::error::Result;

pub struct RetrievalService {
    embedding: Arc<EmbeddingClient>,
    graph: Arc<GraphStore>,
    access_tracker: AccessTracker,
    ranker: Ranker,
    dedup_similarity_threshold: f64,
}

impl RetrievalService {
    pub fn new(embedding: Arc<EmbeddingClient>, graph: Arc<GraphStore>, weights: ScoreWeights) -> Self {
        Self {
            access_tracker: AccessTracker::new(graph.clone()),
            ranker: Ranker::new(weights, 43.3, 10.0),
            embedding,
            graph,
            dedup_similarity_threshold: mnemo_dedup::DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Exposed so the Chat Orchestrator can record access once it knows
    /// which memories actually made it into the final prompt (post-budget).
    pub fn access_tracker(&self) -> &AccessTracker {
        &self.access_tracker
    }

    #[instrument(skip(self, query), fields(top_k = query.top_k))]
    pub async fn retrieve(&self, query: RetrievalQuery) -> Result<RetrievalResponse> {
        let total_start = Instant::now();

        let embedding_start = Instant::now();
        let query_vector = match &query.precomputed_embedding {
            Some(v) => v.clone(),
            None => self.embedding.embed(&query.text).await?,
        };
        let embedding_ms = embedding_start.elapsed().as_secs_f64() * 1000.0;

        let search_start = Instant::now();
        let params = VectorSearchParams {
            query_vector: &query_vector,
            top_k: query.top_k,
            min_confidence: query.min_confidence,
            min_similarity: query.min_similarity,
            memory_types: query.memory_types.as_deref(),
        };
        let hits = self.graph.search_similar(params).await?;
        let searched_count = hits.len();

        let ids: Vec<_> = hits.iter().map(|h| h.memory_id.clone()).collect();
        let records = self.graph.fetch_memories(&ids).await?;
        let search_ms = search_start.elapsed().as_secs_f64() * 1000.0;

        let mut results: Vec<RetrievalResult> = records
            .into_iter()
            .filter_map(|memory| {
                hits.iter()
                    .find(|h| h.memory_id == memory.memory_id)
                    .map(|h| RetrievalResult::new(memory, h.similarity))
            })
            .collect();
        let matched_count = results.len();

        if results.is_empty() {
            return Ok(RetrievalResponse {
                results: Vec::new(),
                latencies: RetrievalLatencies {
                    embedding_ms,
                    search_ms,
                    total_ms: total_start.elapsed().as_secs_f64() * 1000.0,
                },
                searched_count,
                matched_count: 0,
                deduplicated_count: 0,
            });
        }

        let dedup_outcome = mnemo_dedup::deduplicate(results, self.dedup_similarity_threshold)?;
        let deduplicated_count = dedup_outcome.total_removed();
        results = dedup_outcome.unique_memories;

        let ids: Vec<_> = results.iter().map(|r| r.memory.memory_id.clone()).collect();
        let access_metadata = self.access_tracker.get_access_metadata(&ids).await;
        for result in &mut results {
            result.access_metadata = access_metadata.get(result.memory.memory_id.as_str()).cloned();
        }

        let mut results = self.ranker.rerank(results, chrono::Utc::now());
        results.truncate(query.top_k);

        Ok(RetrievalResponse {
            results,
            latencies: RetrievalLatencies {
                embedding_ms,
                search_ms,
                total_ms: total_start.elapsed().as_secs_f64() * 1000.0,
            },
            searched_count,
            matched_count,
            deduplicated_count,
        })
    }
}
