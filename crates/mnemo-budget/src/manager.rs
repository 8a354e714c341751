//! Budget enforcement (`spec.md` §4.11, "Budget Manager"). Ported from
//! `budget_manager.py`'s `apply_budget`/`_apply_hard_cutoff`/`_apply_truncate`.

use mnemo_core::RetrievalResult;
use tracing::debug;

use crate::counter::TokenCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationStrategy {
    /// Keep whole memories in rank order until the budget runs out; drop
    /// the rest.
    HardCutoff,
    /// Allocate the budget proportionally to relevance and truncate content
    /// to fit more memories in.
    Truncate,
}

pub struct BudgetManager {
    counter: TokenCounter,
    default_budget: usize,
    token_buffer: usize,
}

impl Default for BudgetManager {
    fn default() -> Self {
        Self::new(2000, 50)
    }
}

impl BudgetManager {
    pub fn new(default_budget: usize, token_buffer: usize) -> Self {
        Self {
            counter: TokenCounter::new(),
            default_budget,
            token_buffer,
        }
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    fn token_count_of(&self, result: &mut RetrievalResult) -> usize {
        if let Some(count) = result.token_count {
            return count;
        }
        let count = self.counter.count_for_content(&result.memory.content);
        result.token_count = Some(count);
        count
    }

    fn estimate_total_tokens(&self, memories: &mut [RetrievalResult]) -> usize {
        memories.iter_mut().map(|m| self.token_count_of(m)).sum()
    }

    /// Applies the budget, returning the memories that fit (possibly
    /// truncated, under [`TruncationStrategy::Truncate`]).
    pub fn apply_budget(
        &self,
        mut memories: Vec<RetrievalResult>,
        token_budget: Option<usize>,
        strategy: TruncationStrategy,
    ) -> Vec<RetrievalResult> {
        if memories.is_empty() {
            return memories;
        }

        if token_budget == Some(0) {
            debug!("zero token budget specified, returning empty list");
            return Vec::new();
        }

        let budget = token_budget.unwrap_or(self.default_budget);

        let effective_budget: i64 = if budget < 100 {
            budget as i64
        } else {
            budget as i64 - self.token_buffer as i64
        };

        if effective_budget <= 0 {
            debug!(effective_budget, "token budget too small after buffer");
            return Vec::new();
        }
        let effective_budget = effective_budget as usize;

        let total_tokens = self.estimate_total_tokens(&mut memories);
        if total_tokens <= effective_budget {
            return memories;
        }

        match strategy {
            TruncationStrategy::HardCutoff => self.apply_hard_cutoff(memories, effective_budget),
            TruncationStrategy::Truncate => self.apply_truncate(memories, effective_budget),
        }
    }

    fn apply_hard_cutoff(&self, memories: Vec<RetrievalResult>, budget: usize) -> Vec<RetrievalResult> {
        let mut result = Vec::new();
        let mut current_tokens = 0usize;

        for mut memory in memories {
            let tokens = self.token_count_of(&mut memory);
            if current_tokens + tokens <= budget {
                current_tokens += tokens;
                memory.budget_enforced = true;
                result.push(memory);
            } else {
                break;
            }
        }

        debug!(kept = result.len(), current_tokens, budget, "applied hard cutoff");
        result
    }

    fn apply_truncate(&self, memories: Vec<RetrievalResult>, budget: usize) -> Vec<RetrievalResult> {
        if memories.is_empty() {
            return memories;
        }

        let count = memories.len();
        let total_relevance: f64 = memories.iter().map(|m| m.relevance_score).sum::<f64>().max(f64::EPSILON);

        let min_per_memory = if budget >= 50 * count {
            50
        } else {
            (budget / count).max(10)
        };

        let mut result = Vec::new();
        let mut current_tokens = 0usize;

        for mut memory in memories {
            if current_tokens >= budget {
                break;
            }

            let proportional = ((memory.relevance_score / total_relevance) * budget as f64) as usize;
            let mut memory_budget = proportional.max(min_per_memory);
            let remaining = budget - current_tokens;
            memory_budget = memory_budget.min(remaining);

            let tokens = self.token_count_of(&mut memory);
            if tokens <= memory_budget {
                current_tokens += tokens;
            } else {
                memory.memory.content = self.truncate_content(&memory.memory.content, memory_budget);
                memory.token_count = Some(memory_budget);
                current_tokens += memory_budget;
            }
            memory.budget_enforced = true;
            result.push(memory);

            if current_tokens >= budget {
                break;
            }
        }

        debug!(kept = result.len(), current_tokens, budget, "applied truncate");
        result
    }

    /// Shortens `content` so its counted tokens fit within `max_tokens`,
    /// reserving the fixed metadata overhead out of that budget.
    fn truncate_content(&self, content: &str, max_tokens: usize) -> String {
        let content_budget = max_tokens as i64 - crate::counter::METADATA_TOKEN_OVERHEAD as i64;

        if content_budget <= 0 {
            return take_chars(content, 50) + "...";
        }
        let content_budget = content_budget as usize;

        if self.counter.count(content) <= content_budget {
            return content.to_string();
        }

        let char_budget = content_budget * 4;
        let mut truncated = take_chars(content, char_budget) + "...";

        while self.counter.count(&truncated) > content_budget && truncated.chars().count() > 10 {
            let kept = truncated.chars().count().saturating_sub(13);
            truncated = take_chars(&truncated, kept) + "...";
        }

        truncated
    }
}

fn take_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mnemo_core::{ConversationId, MemoryMetadata, MemoryRecord, MemoryType};

    fn result(content: &str, relevance: f64) -> RetrievalResult {
        let record = MemoryRecord::try_new(
            MemoryType::Preference,
            content.to_string(),
            0.9,
            None,
            ConversationId::from("c".to_string()),
            Utc::now(),
            MemoryMetadata::new(),
        )
        .unwrap();
        RetrievalResult::new(record, relevance)
    }

    #[test]
    fn empty_input_returns_empty() {
        let manager = BudgetManager::default();
        assert!(manager.apply_budget(vec![], None, TruncationStrategy::HardCutoff).is_empty());
    }

    #[test]
    fn zero_budget_returns_empty() {
        let manager = BudgetManager::default();
        let memories = vec![result("hello", 0.5)];
        assert!(manager.apply_budget(memories, Some(0), TruncationStrategy::HardCutoff).is_empty());
    }

    #[test]
    fn memories_under_budget_pass_through_unmodified() {
        let manager = BudgetManager::default();
        let memories = vec![result("short", 0.5)];
        let out = manager.apply_budget(memories, Some(2000), TruncationStrategy::HardCutoff);
        assert_eq!(out.len(), 1);
        assert!(!out[0].budget_enforced);
    }

    #[test]
    fn hard_cutoff_drops_memories_once_budget_exhausted() {
        let manager = BudgetManager::default();
        let long_content = "x".repeat(400);
        let memories = vec![result(&long_content, 0.9), result(&long_content, 0.8), result(&long_content, 0.7)];
        let out = manager.apply_budget(memories, Some(150), TruncationStrategy::HardCutoff);
        assert!(out.len() < 3);
        assert!(out.iter().all(|m| m.budget_enforced));
    }

    #[test]
    fn truncate_keeps_more_memories_than_hard_cutoff() {
        let manager = BudgetManager::default();
        let long_content = "word ".repeat(100);
        let memories_cutoff = vec![result(&long_content, 0.9), result(&long_content, 0.8), result(&long_content, 0.7)];
        let memories_truncate = memories_cutoff.clone();
        let cutoff = manager.apply_budget(memories_cutoff, Some(150), TruncationStrategy::HardCutoff);
        let truncate = manager.apply_budget(memories_truncate, Some(150), TruncationStrategy::Truncate);
        assert!(truncate.len() >= cutoff.len());
    }

    #[test]
    fn truncated_content_never_exceeds_small_budget() {
        let manager = BudgetManager::default();
        let long_content = "word ".repeat(200);
        let memories = vec![result(&long_content, 0.9)];
        let out = manager.apply_budget(memories, Some(80), TruncationStrategy::Truncate);
        assert_eq!(out.len(), 1);
        assert!(out[0].budget_enforced);
        assert!(out[0].memory.content.len() < long_content.len());
    }
}
