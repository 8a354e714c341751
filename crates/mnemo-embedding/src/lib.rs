pub mod client;
pub mod error;

pub use client::EmbeddingClient;
pub use error::{EmbeddingError, Result};
