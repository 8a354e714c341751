//! `GET /v1/models` (`spec.md` §6): a minimal OpenAI-compatible model list,
//! reporting the single model resolved from `MODEL_SELECTION`.

use std::sync::Arc;

use axum::{extract::State, Json};
use mnemo_llm::ModelSelector;
use serde::Serialize;
use serde_json::{json, Value};

use crate::app::AppState;

#[derive(Serialize)]
struct ModelEntry {
    id: String,
    object: &'static str,
    created: i64,
    owned_by: String,
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Value> {
    let created = chrono::Utc::now().timestamp();
    let entry = match ModelSelector::parse(&state.config.model_selection) {
        Ok(selector) => ModelEntry {
            id: selector.model,
            object: "model",
            created,
            owned_by: selector.provider,
        },
        Err(_) => ModelEntry {
            id: state.config.model_selection.clone(),
            object: "model",
            created,
            owned_by: "unknown".to_string(),
        },
    };

    Json(json!({
        "object": "list",
        "data": [entry],
    }))
}
