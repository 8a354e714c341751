pub mod dedup;
pub mod error;
pub mod similarity;

pub use dedup::{deduplicate, DedupMetadata, DeduplicationResult, DEFAULT_SIMILARITY_THRESHOLD};
pub use error::{DedupError, Result};
pub use similarity::cosine_similarity;
