//! Token counting (`spec.md` §4.11, "Budget Manager"). No tokenizer crate is
//! available in the retrieval pack's stack, so this always uses the
//! 4-characters-per-token approximation `budget_manager.py` falls back to
//! when `tiktoken` isn't installed; the per-text result is cached the same
//! way, via an LRU cache standing in for `functools.lru_cache(maxsize=1024)`.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

const CACHE_CAPACITY: usize = 1024;
const CHARS_PER_TOKEN: usize = 4;

/// Token overhead charged per memory for type, confidence, and timestamp
/// fields that accompany the content in a rendered prompt.
pub const METADATA_TOKEN_OVERHEAD: usize = 20;

pub struct TokenCounter {
    cache: Mutex<LruCache<String, usize>>,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }

    /// Counts tokens in `text`, memoizing by exact text match.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let mut cache = self.cache.lock().unwrap();
        if let Some(&cached) = cache.get(text) {
            return cached;
        }

        let count = (text.len() / CHARS_PER_TOKEN).max(1);
        cache.put(text.to_string(), count);
        count
    }

    /// Counts tokens for a memory's content plus its fixed metadata overhead.
    pub fn count_for_content(&self, content: &str) -> usize {
        self.count(content) + METADATA_TOKEN_OVERHEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_counts_zero() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn short_text_counts_at_least_one_token() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count("hi"), 1);
    }

    #[test]
    fn repeated_text_hits_cache_with_same_result() {
        let counter = TokenCounter::new();
        let text = "the quick brown fox jumps over the lazy dog";
        let first = counter.count(text);
        let second = counter.count(text);
        assert_eq!(first, second);
    }

    #[test]
    fn content_overhead_adds_metadata_tokens() {
        let counter = TokenCounter::new();
        let content = "some memory content here";
        assert_eq!(counter.count_for_content(content), counter.count(content) + METADATA_TOKEN_OVERHEAD);
    }
}
