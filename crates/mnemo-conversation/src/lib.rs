pub mod error;
pub mod manager;
pub mod sink;

pub use error::ConversationError;
pub use manager::{ConversationTracker, ProcessOutcome};
pub use sink::{FsTranscriptSink, InMemoryTranscriptSink, TranscriptSink};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mnemo_boundary::BoundaryThresholds;
    use mnemo_core::{ConversationMessage, Role};
    use std::sync::Arc;

    fn msg(content: &str, ts: chrono::DateTime<Utc>) -> ConversationMessage {
        ConversationMessage {
            role: Role::User,
            content: content.to_string(),
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn first_request_for_unknown_session_is_not_detected() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let tracker = ConversationTracker::new(sink, 1000, BoundaryThresholds::default());
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let outcome = tracker
            .process_request("s1".into(), vec![msg("hello", t)], t)
            .await
            .unwrap();
        assert!(!outcome.boundary.detected);
        assert!(outcome.closed_transcript.is_none());
    }

    #[tokio::test]
    async fn boundary_closes_and_writes_transcript() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let tracker = ConversationTracker::new(sink.clone(), 1000, BoundaryThresholds::default());
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        tracker
            .process_request(
                "s1".into(),
                vec![msg("a", t0), msg("b", t0), msg("c", t0), msg("d", t0), msg("e", t0)],
                t0,
            )
            .await
            .unwrap();

        let t1 = t0 + chrono::Duration::minutes(15);
        let outcome = tracker
            .process_request("s1".into(), vec![msg("new topic", t1), msg("x", t1)], t1)
            .await
            .unwrap();

        assert!(outcome.boundary.detected);
        let transcript = outcome.closed_transcript.expect("transcript assembled");
        assert_eq!(transcript.message_count, 5);

        // give the fire-and-forget write task a chance to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(sink.written().await.len(), 1);
    }

    #[tokio::test]
    async fn eviction_removes_least_recently_touched_session() {
        let sink = Arc::new(InMemoryTranscriptSink::new());
        let tracker = ConversationTracker::new(sink, 2, BoundaryThresholds::default());
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        tracker.process_request("s1".into(), vec![msg("a", t)], t).await.unwrap();
        tracker.process_request("s2".into(), vec![msg("a", t)], t).await.unwrap();
        // touch s1 again so s2 becomes the least-recently-touched.
        tracker.process_request("s1".into(), vec![msg("a2", t)], t).await.unwrap();
        tracker.process_request("s3".into(), vec![msg("a", t)], t).await.unwrap();

        assert_eq!(tracker.tracked_count(), 2);
    }
}
