//! Background ingestion pipeline (`spec.md` §4.5 "Memory Store",
//! `store_extraction_result`): runs C3→C4 extraction over a freshly closed
//! transcript, then for each calibrated memory embeds it, checks for a
//! contradiction, and stores the record. Dispatched from the chat handler
//! via `tokio::spawn` so it never sits on the request's critical path.
//!
//! Embeddings are generated inline here, rather than left entirely to the
//! Backfill Worker, so contradiction detection (`spec.md` §4.5 step 1,
//! which requires the candidate's embedding) can run at ingestion time; the
//! Backfill Worker remains the catch-up path for any memory whose inline
//! embedding attempt failed.

use std::sync::Arc;

use mnemo_core::{ConversationId, MemoryRecord, Transcript};
use tracing::{error, info, instrument, warn};

use crate::app::AppState;

/// `spec.md` §4.5 step 1: minimum cosine similarity to treat a prior
/// memory as contradicted by a new one.
const CONTRADICTION_SIMILARITY_THRESHOLD: f64 = 0.75;

#[instrument(skip(state, transcript), fields(session_id = %transcript.session_id))]
pub async fn ingest_transcript(state: Arc<AppState>, transcript: Transcript) {
    let conversation_id: ConversationId = transcript.conversation_id();

    let outcome = state.extraction.extract_memories(&transcript).await;
    if let Some(err) = &outcome.error {
        warn!(%conversation_id, error = %err, "extraction failed, transcript retained but no memories stored");
        return;
    }
    if outcome.memories.is_empty() {
        return;
    }

    let now = chrono::Utc::now();
    let mut stored = 0u32;

    for candidate in outcome.memories {
        let record = match MemoryRecord::try_new(
            candidate.memory_type,
            candidate.content,
            candidate.confidence,
            None,
            conversation_id.clone(),
            now,
            candidate.metadata,
        ) {
            Ok(record) => record,
            Err(e) => {
                warn!(%conversation_id, error = %e, "calibrated memory below persistence floor, dropping");
                continue;
            }
        };

        if let Err(e) = store_one(&state, record).await {
            error!(%conversation_id, error = %e, "failed to store extracted memory, continuing with remaining memories");
            continue;
        }
        stored += 1;
    }

    info!(%conversation_id, stored, "ingestion complete");
}

async fn store_one(state: &AppState, mut record: MemoryRecord) -> mnemo_graph::Result<()> {
    let embedding = match state.embedding.embed(&record.content).await {
        Ok(vector) => Some(vector),
        Err(e) => {
            warn!(memory_id = %record.memory_id, error = %e, "inline embedding failed, deferring to backfill worker");
            None
        }
    };

    if let Some(vector) = &embedding {
        let contradiction = state
            .graph
            .detect_contradiction(
                &record.memory_id,
                vector,
                &record.content,
                record.valid_from,
                CONTRADICTION_SIMILARITY_THRESHOLD,
            )
            .await;

        if let Some(contradiction) = contradiction {
            info!(
                memory_id = %record.memory_id,
                superseded = %contradiction.memory_id,
                similarity = contradiction.similarity,
                "contradiction detected, superseding prior memory"
            );
            state
                .graph
                .handle_superseding(&record.memory_id, record.valid_from, &contradiction.memory_id)
                .await?;
            record.supersedes = Some(contradiction.memory_id);
        }
    }

    state.graph.store_memory(&record).await?;

    if let Some(vector) = embedding {
        state
            .graph
            .store_embedding(&record.memory_id, &vector, &state.config.embedding_model)
            .await?;
    }

    Ok(())
}
