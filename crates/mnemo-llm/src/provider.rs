use async_trait::async_trait;
use mnemo_core::{MemoryMetadata, MemoryType};
use tokio::sync::mpsc;

use crate::types::{ChatRequest, ChatResponse, ProviderError, StreamEvent};

/// One candidate item produced by structured extraction, before confidence
/// calibration (`spec.md` §4.3).
#[derive(Debug, Clone)]
pub struct ExtractionCandidate {
    pub memory_type: MemoryType,
    pub content: String,
    pub base_confidence: f64,
    pub metadata: MemoryMetadata,
}

#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub model: String,
    pub system_prompt: String,
    pub transcript_prompt: String,
}

/// Common interface for the out-of-scope external LLM client, carrying
/// both free-text chat and a structured-extraction method since memory
/// extraction needs typed output rather than prose.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Default: falls back to non-streaming `send`, emits one `TextDelta`
    /// then `Done`.
    async fn send_stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let resp = self.send(req).await?;
        let _ = tx
            .send(StreamEvent::TextDelta {
                text: resp.content,
            })
            .await;
        let _ = tx
            .send(StreamEvent::Done {
                model: resp.model,
                tokens_in: resp.tokens_in,
                tokens_out: resp.tokens_out,
                stop_reason: resp.stop_reason,
            })
            .await;
        Ok(())
    }

    /// Structured memory extraction. Implementations are expected to
    /// configure the underlying model with a schema constraining output to
    /// a list of `{memory_type, content, base_confidence, metadata}`
    /// objects; on any failure the caller (C3) treats it as "no memories,
    /// error recorded" rather than propagating.
    async fn extract(
        &self,
        req: &ExtractionRequest,
    ) -> Result<Vec<ExtractionCandidate>, ProviderError>;
}
