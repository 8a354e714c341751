use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding generation failed: {0}")]
    Embedding(#[from] mnemo_embedding::EmbeddingError),
    #[error("graph search failed: {0}")]
    Graph(#[from] mnemo_graph::GraphError),
    #[error("deduplication failed: {0}")]
    Dedup(#[from] mnemo_dedup::DedupError),
}

impl RetrievalError {
    /// Stable machine-readable code for the HTTP boundary.
    pub fn code(&self) -> &'static str {
        match self {
            RetrievalError::Embedding(_) => "embedding_failed",
            RetrievalError::Graph(_) => "graph_search_failed",
            RetrievalError::Dedup(_) => "dedup_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
