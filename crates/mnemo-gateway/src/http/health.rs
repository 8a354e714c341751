//! `GET /healthz` (`SPEC_FULL.md` §4 supplemental): aggregates the
//! embedding client and graph store health checks, since the distilled
//! spec names health as part of the Backfill Worker's lifecycle without
//! specifying an HTTP surface for it.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<Value> {
    let embedding_ok = state.embedding.health_check().await;
    let graph_ok = state.graph.health_check().await;
    let status = if embedding_ok && graph_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "embedding_ok": embedding_ok,
        "graph_ok": graph_ok,
    }))
}
