//! C2 Conversation Tracker — `spec.md` §4.2.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use mnemo_boundary::{detect_boundary, hash_first_message, BoundaryResult, BoundaryThresholds};
use mnemo_core::{ConversationMessage, SessionId, SessionMetadata, Transcript};
use tracing::{instrument, warn};

use crate::error::{ConversationError, Result};
use crate::sink::TranscriptSink;

/// Outcome of one `process_request` call.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub boundary: BoundaryResult,
    /// Present only when a boundary was detected: the transcript assembled
    /// for the session that just closed.
    pub closed_transcript: Option<Transcript>,
}

struct Inner {
    sessions: HashMap<SessionId, SessionMetadata>,
    buffers: HashMap<SessionId, Vec<ConversationMessage>>,
    /// Access order, oldest first. A plain `HashMap` has no order; this is
    /// the true recency-LRU structure (move-to-end on touch, pop-front on
    /// eviction) that a naive insertion-order cache cannot provide.
    access_order: IndexMap<SessionId, ()>,
}

impl Inner {
    fn touch(&mut self, id: &SessionId) {
        self.access_order.shift_remove(id);
        self.access_order.insert(id.clone(), ());
    }

    fn evict_if_needed(&mut self, max_tracked: usize) -> Option<SessionId> {
        if self.access_order.len() <= max_tracked {
            return None;
        }
        let (oldest, _) = self.access_order.shift_remove_index(0)?;
        self.sessions.remove(&oldest);
        self.buffers.remove(&oldest);
        Some(oldest)
    }
}

/// Thread-safe registry of live sessions driving the Boundary Detector and
/// persisting closed transcripts.
pub struct ConversationTracker {
    inner: Mutex<Inner>,
    sink: Arc<dyn TranscriptSink>,
    max_tracked: usize,
    thresholds: BoundaryThresholds,
}

impl ConversationTracker {
    pub fn new(sink: Arc<dyn TranscriptSink>, max_tracked: usize, thresholds: BoundaryThresholds) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                buffers: HashMap::new(),
                access_order: IndexMap::new(),
            }),
            sink,
            max_tracked,
            thresholds,
        }
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.lock().expect("tracker lock poisoned").sessions.len()
    }

    /// `spec.md` §4.2. The exclusive lock is held only for the synchronous
    /// bookkeeping; the transcript write is dispatched after the lock is
    /// released so the chat request path never waits on filesystem I/O.
    #[instrument(skip(self, messages), fields(session_id = %session_id))]
    pub async fn process_request(
        &self,
        session_id: SessionId,
        messages: Vec<ConversationMessage>,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome> {
        let first = messages.first().ok_or(ConversationError::EmptyMessages)?;
        let new_hash = hash_first_message(&first.content);
        let new_count = messages.len();

        let (outcome, evicted) = {
            let mut inner = self.inner.lock().expect("tracker lock poisoned");

            if !inner.sessions.contains_key(&session_id) {
                inner.sessions.insert(
                    session_id.clone(),
                    SessionMetadata {
                        session_id: session_id.clone(),
                        first_seen: now,
                        last_seen: now,
                        last_message_count: new_count,
                        first_message_hash: new_hash,
                    },
                );
                inner.buffers.insert(session_id.clone(), messages);
                inner.touch(&session_id);
                let evicted = inner.evict_if_needed(self.max_tracked);
                let outcome = ProcessOutcome {
                    boundary: BoundaryResult {
                        detected: false,
                        reason: None,
                        idle_seconds: 0.0,
                        drop_percent: 0.0,
                        hash_changed: false,
                    },
                    closed_transcript: None,
                };
                (outcome, evicted)
            } else {
                let prior = inner.sessions.get(&session_id).cloned().unwrap();
                let boundary = detect_boundary(&prior, new_count, &new_hash, now, self.thresholds);

                let closed_transcript = if boundary.detected {
                    let buffered = inner
                        .buffers
                        .get(&session_id)
                        .cloned()
                        .unwrap_or_default();
                    let transcript = assemble_transcript(
                        &prior,
                        buffered,
                        now,
                        boundary.reason.expect("detected boundary always carries a reason"),
                    );

                    inner.sessions.insert(
                        session_id.clone(),
                        SessionMetadata {
                            session_id: session_id.clone(),
                            first_seen: now,
                            last_seen: now,
                            last_message_count: new_count,
                            first_message_hash: new_hash,
                        },
                    );
                    inner.buffers.insert(session_id.clone(), messages);
                    Some(transcript)
                } else {
                    if let Some(meta) = inner.sessions.get_mut(&session_id) {
                        meta.last_seen = now;
                        meta.last_message_count = new_count;
                        meta.first_message_hash = new_hash;
                    }
                    inner.buffers.insert(session_id.clone(), messages);
                    None
                };

                inner.touch(&session_id);
                let evicted = inner.evict_if_needed(self.max_tracked);
                (
                    ProcessOutcome {
                        boundary,
                        closed_transcript,
                    },
                    evicted,
                )
            }
        };

        if let Some(evicted) = evicted {
            tracing::debug!(evicted_session = %evicted, "evicted least-recently-touched session");
        }

        if let Some(transcript) = &outcome.closed_transcript {
            let sink = self.sink.clone();
            let transcript = transcript.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.write(&transcript).await {
                    warn!(error = %e, "failed to persist transcript; request path unaffected");
                }
            });
        }

        Ok(outcome)
    }
}

/// Synthesises per-message timestamps by linear interpolation between
/// `start_time` and `now`, per `spec.md` §4.2 and §9 Open Question 3.
fn assemble_transcript(
    prior: &SessionMetadata,
    mut buffered: Vec<ConversationMessage>,
    now: DateTime<Utc>,
    trigger_reason: mnemo_core::TriggerReason,
) -> Transcript {
    let start = prior.first_seen;
    let len = buffered.len().max(1);
    let duration = now - start;
    for (i, msg) in buffered.iter_mut().enumerate() {
        let offset = duration * (i as i32) / (len as i32);
        msg.timestamp = start + offset;
    }

    Transcript {
        session_id: prior.session_id.clone(),
        start_time: start,
        end_time: now,
        message_count: buffered.len(),
        trigger_reason,
        messages: buffered,
    }
}
