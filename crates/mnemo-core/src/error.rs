use thiserror::Error;

/// Broad error taxonomy (`spec.md` §7) that every crate-local error maps
/// into via `category()`, consumed by the gateway's status-code mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed request, empty messages, invalid model selection.
    Input,
    /// Embedding dimension mismatch, schema violation from the LLM.
    Validation,
    /// Timeouts, 5xx, connection failures — retried before surfacing.
    Transient,
    /// Unknown model, missing memory id.
    NotFound,
    /// Surfaced immediately, never retried.
    RateLimited,
    /// Logged, batch continues; partial success reported upstream.
    GraphWrite,
    Internal,
}

impl ErrorCategory {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::Input => 400,
            ErrorCategory::Validation => 422,
            ErrorCategory::Transient => 503,
            ErrorCategory::NotFound => 404,
            ErrorCategory::RateLimited => 429,
            ErrorCategory::GraphWrite => 500,
            ErrorCategory::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum MnemoError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MnemoError::Config(_) => ErrorCategory::Internal,
            MnemoError::InvalidRequest(_) => ErrorCategory::Input,
            MnemoError::Validation(_) => ErrorCategory::Validation,
            MnemoError::NotFound(_) => ErrorCategory::NotFound,
            MnemoError::RateLimited(_) => ErrorCategory::RateLimited,
            MnemoError::Serialization(_) => ErrorCategory::Input,
            MnemoError::Io(_) => ErrorCategory::Internal,
            MnemoError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            MnemoError::Config(_) => "CONFIG_ERROR",
            MnemoError::InvalidRequest(_) => "INVALID_REQUEST",
            MnemoError::Validation(_) => "VALIDATION_ERROR",
            MnemoError::NotFound(_) => "NOT_FOUND",
            MnemoError::RateLimited(_) => "RATE_LIMITED",
            MnemoError::Serialization(_) => "SERIALIZATION_ERROR",
            MnemoError::Io(_) => "IO_ERROR",
            MnemoError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, MnemoError>;
