pub mod confidence;
pub mod error;
pub mod extractor;
pub mod prompts;

pub use error::{ExtractionError, Result};
pub use extractor::{CalibratedMemory, ExtractionOutcome, ExtractionService};
pub use prompts::{render_transcript_prompt, system_prompt};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use mnemo_core::{ConversationMessage, MemoryMetadata, MemoryType, Role, SessionId, TriggerReason};
    use mnemo_llm::{ChatRequest, ChatResponse, ExtractionCandidate, ExtractionRequest, LlmProvider, ProviderError};
    use std::sync::Arc;

    struct FakeProvider {
        candidates: Vec<ExtractionCandidate>,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            unimplemented!("not exercised by these tests")
        }

        async fn extract(
            &self,
            _req: &ExtractionRequest,
        ) -> std::result::Result<Vec<ExtractionCandidate>, ProviderError> {
            Ok(self.candidates.clone())
        }
    }

    fn transcript(messages: Vec<&str>) -> mnemo_core::Transcript {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        mnemo_core::Transcript {
            session_id: SessionId::from("s1"),
            start_time: start,
            end_time: start + chrono::Duration::minutes(5),
            message_count: messages.len(),
            trigger_reason: TriggerReason::IdleAndHashChange,
            messages: messages
                .into_iter()
                .map(|content| ConversationMessage {
                    role: Role::User,
                    content: content.to_string(),
                    timestamp: start,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn below_min_confidence_candidates_are_dropped() {
        let mut metadata = MemoryMetadata::new();
        metadata.set_is_explicit(false);
        let provider = Arc::new(FakeProvider {
            candidates: vec![ExtractionCandidate {
                memory_type: MemoryType::Preference,
                content: "User prefers Vim".to_string(),
                base_confidence: 0.45,
                metadata,
            }],
        });
        let service = ExtractionService::new(provider, "anthropic:claude-haiku-4-5", 0.6);
        let t = transcript(vec!["I prefer Vim"]);
        let outcome = service.extract_memories(&t).await;
        assert!(outcome.is_successful());
        assert_eq!(outcome.memory_count(), 0);
    }

    #[tokio::test]
    async fn explicit_high_confidence_candidate_survives() {
        let mut metadata = MemoryMetadata::new();
        metadata.set_is_explicit(true);
        let provider = Arc::new(FakeProvider {
            candidates: vec![ExtractionCandidate {
                memory_type: MemoryType::Preference,
                content: "User prefers Docker".to_string(),
                base_confidence: 0.70,
                metadata,
            }],
        });
        let service = ExtractionService::new(provider, "anthropic:claude-haiku-4-5", 0.6);
        let t = transcript(vec!["I prefer Docker over Podman"]);
        let outcome = service.extract_memories(&t).await;
        assert_eq!(outcome.memory_count(), 1);
        assert!((outcome.memories[0].confidence - 0.80).abs() < 1e-9);
    }

    #[tokio::test]
    async fn correction_candidate_gets_fixed_confidence() {
        let metadata = MemoryMetadata::new();
        let provider = Arc::new(FakeProvider {
            candidates: vec![ExtractionCandidate {
                memory_type: MemoryType::Correction,
                content: "User uses Docker, not Podman".to_string(),
                base_confidence: 0.3,
                metadata,
            }],
        });
        let service = ExtractionService::new(provider, "anthropic:claude-haiku-4-5", 0.6);
        let t = transcript(vec!["Actually, I meant Docker not Podman"]);
        let outcome = service.extract_memories(&t).await;
        assert_eq!(outcome.memory_count(), 1);
        assert_eq!(outcome.memories[0].confidence, 0.80);
    }

    #[tokio::test]
    async fn batch_extraction_preserves_order_and_respects_concurrency_limit() {
        let metadata_factory = || {
            let mut m = MemoryMetadata::new();
            m.set_is_explicit(true);
            m
        };
        let provider = Arc::new(FakeProvider {
            candidates: vec![ExtractionCandidate {
                memory_type: MemoryType::Preference,
                content: "User prefers Docker".to_string(),
                base_confidence: 0.70,
                metadata: metadata_factory(),
            }],
        });
        let service = ExtractionService::new(provider, "anthropic:claude-haiku-4-5", 0.6);
        let transcripts = vec![
            transcript(vec!["msg a"]),
            transcript(vec!["msg b"]),
            transcript(vec!["msg c"]),
        ];
        let results = service.extract_batch(&transcripts, 2).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_successful()));
    }
}
