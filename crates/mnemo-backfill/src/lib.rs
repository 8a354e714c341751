pub mod engine;

pub use engine::{BackfillEngine, BackfillHandle, BatchOutcome, Progress};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_outcome_defaults_to_zero() {
        let outcome = BatchOutcome::default();
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.skipped, 0);
    }
}
