//! `POST /v1/admin/backfill/retry` (`SPEC_FULL.md` §4 supplemental):
//! drains and retries the Backfill Worker's dead-letter queue on demand,
//! mirroring `original_source/backfill_worker.py::retry_dead_letter_queue`
//! as an explicit operation rather than an automatic one.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn retry_backfill(State(state): State<Arc<AppState>>) -> Json<Value> {
    let outcome = state.backfill.retry_dead_letter().await;
    Json(json!({
        "processed": outcome.processed,
        "failed": outcome.failed,
        "skipped": outcome.skipped,
    }))
}
