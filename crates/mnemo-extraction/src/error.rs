#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("LLM provider error: {0}")]
    Provider(#[from] mnemo_llm::ProviderError),

    #[error("empty transcript")]
    EmptyTranscript,
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
