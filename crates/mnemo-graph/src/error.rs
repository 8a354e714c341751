#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph connection error: {0}")]
    Connection(#[from] neo4rs::Error),

    #[error("graph deserialization error: {0}")]
    Deserialize(#[from] neo4rs::DeError),

    #[error("invalid embedding dimensions: expected {expected}, got {actual}")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },

    #[error("memory {0} not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
