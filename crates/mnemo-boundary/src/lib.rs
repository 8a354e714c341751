//! C1 Boundary Detector — `spec.md` §4.1.
//!
//! A pure function: no clock reads, no I/O, no shared state. The Conversation
//! Tracker (`mnemo-conversation`) is the only caller.

use chrono::{DateTime, Utc};
use mnemo_core::{SessionMetadata, TriggerReason};
use serde::{Deserialize, Serialize};

/// Thresholds configured on the gateway (`BOUNDARY_IDLE_MINUTES`,
/// `BOUNDARY_DROP_FRACTION`), passed explicitly rather than read from a
/// global so the function stays pure and unit-testable.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryThresholds {
    pub idle_minutes: u32,
    pub drop_fraction: f64,
}

impl Default for BoundaryThresholds {
    fn default() -> Self {
        Self {
            idle_minutes: 10,
            drop_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryResult {
    pub detected: bool,
    pub reason: Option<TriggerReason>,
    pub idle_seconds: f64,
    pub drop_percent: f64,
    pub hash_changed: bool,
}

impl BoundaryResult {
    fn not_detected(idle_seconds: f64, drop_percent: f64, hash_changed: bool) -> Self {
        Self {
            detected: false,
            reason: None,
            idle_seconds,
            drop_percent,
            hash_changed,
        }
    }
}

/// SHA-256 hex digest of a message's content, used both to seed a new
/// session's `first_message_hash` and to test the hash-change condition.
pub fn hash_first_message(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Implements `spec.md` §4.1's five-step algorithm exactly: idle gate, drop
/// percentage, hash comparison, strict-`>` drop trigger, four-way reason
/// branch.
pub fn detect_boundary(
    prior: &SessionMetadata,
    new_message_count: usize,
    new_first_hash: &str,
    now: DateTime<Utc>,
    thresholds: BoundaryThresholds,
) -> BoundaryResult {
    let idle = now - prior.last_seen;
    let idle_seconds = idle.num_milliseconds() as f64 / 1000.0;
    let idle_threshold_seconds = (thresholds.idle_minutes as f64) * 60.0;

    if idle_seconds <= idle_threshold_seconds {
        return BoundaryResult::not_detected(idle_seconds, 0.0, false);
    }

    let prev_count = prior.last_message_count;
    let drop_percent = if prev_count > 0 {
        let drop = (prev_count as i64 - new_message_count as i64).max(0) as f64;
        (drop / prev_count as f64) * 100.0
    } else {
        0.0
    };

    let hash_changed = new_first_hash != prior.first_message_hash;
    let drop_triggered = drop_percent > thresholds.drop_fraction * 100.0;

    let reason = match (drop_triggered, hash_changed) {
        (true, true) => Some(TriggerReason::IdleAndBoth),
        (true, false) => Some(TriggerReason::IdleAndMessageDrop),
        (false, true) => Some(TriggerReason::IdleAndHashChange),
        (false, false) => None,
    };

    match reason {
        Some(reason) => BoundaryResult {
            detected: true,
            reason: Some(reason),
            idle_seconds,
            drop_percent,
            hash_changed,
        },
        None => BoundaryResult::not_detected(idle_seconds, drop_percent, hash_changed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn prior_at(last_seen: DateTime<Utc>, count: usize, hash: &str) -> SessionMetadata {
        SessionMetadata {
            session_id: "s1".into(),
            first_seen: last_seen,
            last_seen,
            last_message_count: count,
            first_message_hash: hash.to_string(),
        }
    }

    #[test]
    fn boundary_by_message_drop() {
        // Scenario 3: request A at T with 5 messages, request B at T+15min
        // with 2 messages, same hash. Expect detected, drop=60%.
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prior = prior_at(t, 5, "h1");
        let now = t + chrono::Duration::minutes(15);
        let result = detect_boundary(&prior, 2, "h1", now, BoundaryThresholds::default());
        assert!(result.detected);
        assert_eq!(result.reason, Some(TriggerReason::IdleAndMessageDrop));
        assert!((result.drop_percent - 60.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_by_hash_change_only() {
        // Scenario 4: 2 messages -> 2 messages, but different first hash,
        // idle 12 minutes.
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prior = prior_at(t, 2, "talk-about-proxmox");
        let now = t + chrono::Duration::minutes(12);
        let result = detect_boundary(
            &prior,
            2,
            "talk-about-docker",
            now,
            BoundaryThresholds::default(),
        );
        assert!(result.detected);
        assert_eq!(result.reason, Some(TriggerReason::IdleAndHashChange));
        assert!(result.hash_changed);
    }

    #[test]
    fn exactly_at_threshold_does_not_trigger() {
        // Scenario 5: 10 -> 5 messages (exactly 50% drop) at T+10:01. Strict
        // `>` means exactly 50% does not trigger.
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prior = prior_at(t, 10, "h1");
        let now = t + chrono::Duration::minutes(10) + chrono::Duration::seconds(1);
        let result = detect_boundary(&prior, 5, "h1", now, BoundaryThresholds::default());
        assert!(!result.detected);
        assert!((result.drop_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn idle_under_threshold_never_triggers() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prior = prior_at(t, 10, "h1");
        let now = t + chrono::Duration::minutes(5);
        let result = detect_boundary(&prior, 1, "h2", now, BoundaryThresholds::default());
        assert!(!result.detected);
    }

    #[test]
    fn both_drop_and_hash_change_report_idle_and_both() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prior = prior_at(t, 10, "h1");
        let now = t + chrono::Duration::minutes(11);
        let result = detect_boundary(&prior, 1, "h2", now, BoundaryThresholds::default());
        assert!(result.detected);
        assert_eq!(result.reason, Some(TriggerReason::IdleAndBoth));
    }

    #[test]
    fn is_deterministic_for_identical_inputs() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prior = prior_at(t, 10, "h1");
        let now = t + chrono::Duration::minutes(11);
        let a = detect_boundary(&prior, 1, "h2", now, BoundaryThresholds::default());
        let b = detect_boundary(&prior, 1, "h2", now, BoundaryThresholds::default());
        assert_eq!(a, b);
    }

    #[test]
    fn hash_first_message_matches_known_sha256() {
        // sha256("") == e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let digest = hash_first_message("");
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
