//! Multi-factor re-ranking (`spec.md` §4.10, "Ranker"). Direct port of
//! `ranker.py`'s composite score: similarity, confidence, recency (exponential
//! decay), and frequency (logarithmic scaling).

use chrono::{DateTime, Utc};
use mnemo_core::{RetrievalResult, ScoreWeights};

pub struct Ranker {
    weights: ScoreWeights,
    recency_half_life_days: f64,
    frequency_scale_factor: f64,
}

impl Default for Ranker {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            recency_half_life_days: 43.3,
            frequency_scale_factor: 10.0,
        }
    }
}

impl Ranker {
    pub fn new(weights: ScoreWeights, recency_half_life_days: f64, frequency_scale_factor: f64) -> Self {
        Self {
            weights,
            recency_half_life_days,
            frequency_scale_factor,
        }
    }

    /// Re-ranks in place by composite score, descending, and assigns
    /// 1-indexed `rank`. A single-element input short-circuits (sets
    /// rank=1 without recomputing `relevance_score`, matching the original).
    pub fn rerank(&self, mut results: Vec<RetrievalResult>, now: DateTime<Utc>) -> Vec<RetrievalResult> {
        if results.is_empty() {
            return results;
        }

        if results.len() == 1 {
            results[0].rank = 1;
            return results;
        }

        for result in &mut results {
            result.relevance_score = self.composite_score(result, now);
        }

        results.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));

        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i + 1;
        }

        results
    }

    fn composite_score(&self, result: &RetrievalResult, now: DateTime<Utc>) -> f64 {
        let similarity_score = result.similarity_score;
        let confidence_score = result.memory.confidence;
        let recency_score = self.recency_score(result.memory.extraction_timestamp, now);
        let frequency_score = self.frequency_score_from_metadata(result);

        self.weights.similarity * similarity_score
            + self.weights.confidence * confidence_score
            + self.weights.recency * recency_score
            + self.weights.frequency * frequency_score
    }

    fn recency_score(&self, extraction_timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let days_ago = (now - extraction_timestamp).num_milliseconds() as f64 / 86_400_000.0;
        let decay_constant = std::f64::consts::LN_2 / self.recency_half_life_days;
        (-decay_constant * days_ago).exp()
    }

    fn frequency_score_from_metadata(&self, result: &RetrievalResult) -> f64 {
        match &result.access_metadata {
            Some(meta) => self.frequency_score(meta.access_count),
            None => 0.0,
        }
    }

    fn frequency_score(&self, access_count: u64) -> f64 {
        if access_count == 0 {
            return 0.0;
        }
        let numerator = ((1 + access_count) as f64).ln();
        let denominator = ((1 + access_count) as f64 + self.frequency_scale_factor).ln();
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mnemo_core::{AccessMetadata, ConversationId, MemoryMetadata, MemoryRecord, MemoryType};

    fn result(confidence: f64, similarity: f64, age_days: i64, access_count: u64) -> RetrievalResult {
        let now = Utc::now();
        let record = MemoryRecord::try_new(
            MemoryType::Preference,
            "content".to_string(),
            confidence,
            None,
            ConversationId::from("c".to_string()),
            now - Duration::days(age_days),
            MemoryMetadata::new(),
        )
        .unwrap();
        let mut r = RetrievalResult::new(record, similarity);
        r.access_metadata = Some(AccessMetadata {
            memory_id: None,
            last_accessed: None,
            access_count,
        });
        r
    }

    #[test]
    fn empty_input_returns_empty() {
        let ranker = Ranker::default();
        assert!(ranker.rerank(vec![], Utc::now()).is_empty());
    }

    #[test]
    fn single_result_gets_rank_one() {
        let ranker = Ranker::default();
        let r = result(0.8, 0.9, 1, 0);
        let out = ranker.rerank(vec![r], Utc::now());
        assert_eq!(out[0].rank, 1);
    }

    #[test]
    fn more_recent_and_similar_ranks_first() {
        let ranker = Ranker::default();
        let now = Utc::now();
        let fresh = result(0.8, 0.95, 1, 5);
        let stale = result(0.8, 0.95, 365, 5);
        let out = ranker.rerank(vec![stale, fresh], now);
        assert_eq!(out[0].rank, 1);
        assert!(out[0].relevance_score > out[1].relevance_score);
    }

    #[test]
    fn frequency_never_accessed_scores_zero() {
        let ranker = Ranker::default();
        assert_eq!(ranker.frequency_score(0), 0.0);
    }

    #[test]
    fn frequency_increases_with_diminishing_returns() {
        let ranker = Ranker::default();
        let low = ranker.frequency_score(1);
        let mid = ranker.frequency_score(10);
        let high = ranker.frequency_score(100);
        assert!(low < mid);
        assert!(mid < high);
        assert!(high < 1.0);
    }
}
