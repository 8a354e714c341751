//! Error classification, ported from `ollama_client.py`'s
//! `error_type`/`recoverable` split.

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("text cannot be empty")]
    EmptyText,

    #[error("batch size {0} exceeds the maximum of {1}")]
    BatchTooLarge(usize, usize),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("embedding model error: {0}")]
    Model(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown embedding error: {0}")]
    Unknown(String),
}

impl EmbeddingError {
    /// Whether a retry is worth attempting. Model-not-found and shape
    /// mismatches are never recoverable; connection drops, timeouts, and 5xx
    /// responses are.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Connection(_) | EmbeddingError::Timeout(_)
        ) || matches!(self, EmbeddingError::Model(msg) if msg.starts_with("server error"))
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;
