//! Memory deduplication (`spec.md` §4.9, "Deduplicator"). Direct port of
//! `deduplicator.py`'s three-pass algorithm: correction superseding, exact
//! duplicates (similarity >= 0.999), then semantic duplicates (threshold <
//! similarity < 0.999), always keeping the higher-confidence member of a
//! pair.

use std::collections::{HashMap, HashSet};

use mnemo_core::{MemoryId, RetrievalResult};
use tracing::{debug, info, warn};

use crate::error::{DedupError, Result};
use crate::similarity::cosine_similarity;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.92;
const EXACT_DUPLICATE_THRESHOLD: f64 = 0.999;

#[derive(Debug, Clone, Default)]
pub struct DedupMetadata {
    pub similarity_threshold: f64,
    pub removed_memory_ids: Vec<MemoryId>,
    pub removal_reasons: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct DeduplicationResult {
    pub unique_memories: Vec<RetrievalResult>,
    pub duplicate_count: usize,
    pub similar_count: usize,
    pub superseded_count: usize,
    pub dedup_metadata: DedupMetadata,
}

impl DeduplicationResult {
    pub fn total_removed(&self) -> usize {
        self.duplicate_count + self.similar_count + self.superseded_count
    }
}

pub fn deduplicate(
    memories: Vec<RetrievalResult>,
    similarity_threshold: f64,
) -> Result<DeduplicationResult> {
    if memories.is_empty() {
        return Err(DedupError::EmptyInput);
    }
    if !(0.0..=1.0).contains(&similarity_threshold) {
        return Err(DedupError::InvalidThreshold(similarity_threshold));
    }

    let (with_embeddings, without_embeddings): (Vec<_>, Vec<_>) = memories
        .into_iter()
        .partition(|r| r.memory.has_embedding && r.memory.embedding.is_some());

    for r in &without_embeddings {
        warn!(memory_id = %r.memory.memory_id, "memory has no embedding, excluding from deduplication");
    }

    if with_embeddings.is_empty() {
        let mut unique = with_embeddings;
        unique.extend(without_embeddings);
        return Ok(DeduplicationResult {
            unique_memories: unique,
            duplicate_count: 0,
            similar_count: 0,
            superseded_count: 0,
            dedup_metadata: DedupMetadata {
                similarity_threshold,
                ..Default::default()
            },
        });
    }

    if with_embeddings.len() == 1 {
        let mut unique = with_embeddings;
        unique.extend(without_embeddings);
        return Ok(DeduplicationResult {
            unique_memories: unique,
            duplicate_count: 0,
            similar_count: 0,
            superseded_count: 0,
            dedup_metadata: DedupMetadata {
                similarity_threshold,
                ..Default::default()
            },
        });
    }

    let (after_corrections, superseded_ids) = handle_corrections(with_embeddings);
    let superseded_count = superseded_ids.len();

    let matrix = similarity_matrix(&after_corrections);

    let (duplicate_indices, duplicate_ids) = identify_exact_duplicates(&after_corrections, &matrix);
    let duplicate_count = duplicate_ids.len();

    let (similar_indices, similar_ids) =
        identify_similar(&after_corrections, &matrix, similarity_threshold, &duplicate_indices);
    let similar_count = similar_ids.len();

    let removed: HashSet<usize> = duplicate_indices.union(&similar_indices).copied().collect();
    let mut unique_memories: Vec<RetrievalResult> = after_corrections
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !removed.contains(idx))
        .map(|(_, mem)| mem)
        .collect();
    unique_memories.extend(without_embeddings);

    let mut removal_reasons = HashMap::new();
    for id in &superseded_ids {
        removal_reasons.insert(id.to_string(), "superseded_by_correction".to_string());
    }
    for id in &duplicate_ids {
        removal_reasons.insert(id.to_string(), "exact_duplicate".to_string());
    }
    for id in &similar_ids {
        removal_reasons.insert(id.to_string(), format!("semantic_similar (>{similarity_threshold})"));
    }

    let mut removed_memory_ids = superseded_ids;
    removed_memory_ids.extend(duplicate_ids);
    removed_memory_ids.extend(similar_ids);

    info!(
        unique = unique_memories.len(),
        removed = removed_memory_ids.len(),
        duplicate_count,
        similar_count,
        superseded_count,
        "deduplication complete"
    );

    Ok(DeduplicationResult {
        unique_memories,
        duplicate_count,
        similar_count,
        superseded_count,
        dedup_metadata: DedupMetadata {
            similarity_threshold,
            removed_memory_ids,
            removal_reasons,
        },
    })
}

fn similarity_matrix(memories: &[RetrievalResult]) -> Vec<Vec<f64>> {
    let n = memories.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let a = memories[i].memory.embedding.as_deref().unwrap_or_default();
            let b = memories[j].memory.embedding.as_deref().unwrap_or_default();
            let sim = cosine_similarity(a, b);
            matrix[i][j] = sim;
            matrix[j][i] = sim;
        }
    }
    matrix
}

fn identify_exact_duplicates(
    memories: &[RetrievalResult],
    matrix: &[Vec<f64>],
) -> (HashSet<usize>, Vec<MemoryId>) {
    let mut removed = HashSet::new();
    let mut ids = Vec::new();
    let n = memories.len();

    for i in 0..n {
        if removed.contains(&i) {
            continue;
        }
        for j in (i + 1)..n {
            if removed.contains(&j) {
                continue;
            }
            if matrix[i][j] >= EXACT_DUPLICATE_THRESHOLD {
                if memories[i].memory.confidence >= memories[j].memory.confidence {
                    removed.insert(j);
                    ids.push(memories[j].memory.memory_id.clone());
                    debug!(kept = %memories[i].memory.memory_id, removed = %memories[j].memory.memory_id, "exact duplicate");
                } else {
                    removed.insert(i);
                    ids.push(memories[i].memory.memory_id.clone());
                    debug!(kept = %memories[j].memory.memory_id, removed = %memories[i].memory.memory_id, "exact duplicate");
                    break;
                }
            }
        }
    }

    (removed, ids)
}

fn identify_similar(
    memories: &[RetrievalResult],
    matrix: &[Vec<f64>],
    threshold: f64,
    already_removed: &HashSet<usize>,
) -> (HashSet<usize>, Vec<MemoryId>) {
    let mut removed = HashSet::new();
    let mut ids = Vec::new();
    let n = memories.len();

    for i in 0..n {
        if already_removed.contains(&i) || removed.contains(&i) {
            continue;
        }
        for j in (i + 1)..n {
            if already_removed.contains(&j) || removed.contains(&j) {
                continue;
            }
            let sim = matrix[i][j];
            if sim > threshold && sim < EXACT_DUPLICATE_THRESHOLD {
                if memories[i].memory.confidence >= memories[j].memory.confidence {
                    removed.insert(j);
                    ids.push(memories[j].memory.memory_id.clone());
                } else {
                    removed.insert(i);
                    ids.push(memories[i].memory.memory_id.clone());
                    break;
                }
            }
        }
    }

    (removed, ids)
}

fn handle_corrections(memories: Vec<RetrievalResult>) -> (Vec<RetrievalResult>, Vec<MemoryId>) {
    let superseded_ids: Vec<MemoryId> = memories
        .iter()
        .filter(|m| m.memory.memory_type.is_correction())
        .filter_map(|m| m.memory.metadata.supersedes_hint())
        .collect();

    if superseded_ids.is_empty() {
        return (memories, Vec::new());
    }

    let filtered = memories
        .into_iter()
        .filter(|m| !superseded_ids.contains(&m.memory.memory_id))
        .collect();

    (filtered, superseded_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mnemo_core::{ConversationId, MemoryMetadata, MemoryRecord, MemoryType};

    fn record(content: &str, confidence: f64, embedding: Vec<f32>) -> RetrievalResult {
        let now = Utc::now();
        let mut record = MemoryRecord::try_new(
            MemoryType::Preference,
            content.to_string(),
            confidence,
            None,
            ConversationId::from("conv_1".to_string()),
            now,
            MemoryMetadata::new(),
        )
        .unwrap();
        record.embedding = Some(embedding);
        record.has_embedding = true;
        RetrievalResult::new(record, 0.0)
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(deduplicate(vec![], 0.92), Err(DedupError::EmptyInput)));
    }

    #[test]
    fn single_memory_short_circuits() {
        let r = record("User prefers Docker", 0.8, vec![1.0, 0.0, 0.0]);
        let result = deduplicate(vec![r], 0.92).unwrap();
        assert_eq!(result.unique_memories.len(), 1);
        assert_eq!(result.total_removed(), 0);
    }

    #[test]
    fn exact_duplicates_keep_higher_confidence() {
        let a = record("User prefers Docker", 0.9, vec![1.0, 0.0, 0.0]);
        let b = record("User prefers Docker", 0.6, vec![1.0, 0.0, 0.0]);
        let result = deduplicate(vec![a, b], 0.92).unwrap();
        assert_eq!(result.unique_memories.len(), 1);
        assert_eq!(result.duplicate_count, 1);
        assert!((result.unique_memories[0].memory.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn semantically_similar_but_not_identical_removed_with_reason() {
        let a = record("User prefers Docker", 0.9, vec![1.0, 0.1, 0.0]);
        let b = record("User likes Docker a lot", 0.5, vec![1.0, 0.09, 0.0]);
        let result = deduplicate(vec![a, b], 0.5).unwrap();
        assert_eq!(result.unique_memories.len(), 1);
        assert_eq!(result.similar_count, 1);
    }

    #[test]
    fn dissimilar_memories_both_survive() {
        let a = record("User prefers Docker", 0.9, vec![1.0, 0.0, 0.0]);
        let b = record("User has 2 kids", 0.8, vec![0.0, 1.0, 0.0]);
        let result = deduplicate(vec![a, b], 0.92).unwrap();
        assert_eq!(result.unique_memories.len(), 2);
        assert_eq!(result.total_removed(), 0);
    }

    #[test]
    fn is_idempotent_on_already_unique_set() {
        let a = record("User prefers Docker", 0.9, vec![1.0, 0.0, 0.0]);
        let b = record("User has 2 kids", 0.8, vec![0.0, 1.0, 0.0]);
        let first = deduplicate(vec![a, b], 0.92).unwrap();
        let second = deduplicate(first.unique_memories.clone(), 0.92).unwrap();
        assert_eq!(first.unique_memories.len(), second.unique_memories.len());
    }

    #[test]
    fn rejects_invalid_threshold() {
        let a = record("x", 0.9, vec![1.0]);
        let b = record("y", 0.8, vec![0.0]);
        assert!(matches!(
            deduplicate(vec![a, b], 1.5),
            Err(DedupError::InvalidThreshold(_))
        ));
    }
}
