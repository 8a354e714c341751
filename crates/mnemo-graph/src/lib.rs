pub mod error;
pub mod store;

pub use error::{GraphError, Result};
pub use store::{Contradiction, GraphConfig, GraphStore, PendingEmbedding, SearchHit, VectorSearchParams};
