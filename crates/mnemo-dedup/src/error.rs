#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error("at least one memory is required for deduplication")]
    EmptyInput,

    #[error("similarity threshold must be between 0.0 and 1.0, got {0}")]
    InvalidThreshold(f64),
}

pub type Result<T> = std::result::Result<T, DedupError>;
