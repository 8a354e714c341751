//! Budget Manager (`spec.md` §4.11). Counts tokens and enforces a budget on
//! the final retrieval result set before it's injected into a prompt.

pub mod counter;
pub mod manager;

pub use counter::{TokenCounter, METADATA_TOKEN_OVERHEAD};
pub use manager::{BudgetManager, TruncationStrategy};
