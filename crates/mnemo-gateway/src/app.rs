//! Central shared state for the Chat Orchestrator (`spec.md` §4.12),
//! modeled on `skynet-gateway::app::AppState`'s thin Arc-holding-struct
//! pattern: every subsystem handle is constructed once in `main.rs` and
//! shared read-only across handlers via `Arc<AppState>`.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use mnemo_backfill::BackfillHandle;
use mnemo_budget::BudgetManager;
use mnemo_conversation::ConversationTracker;
use mnemo_core::MnemoConfig;
use mnemo_embedding::EmbeddingClient;
use mnemo_extraction::ExtractionService;
use mnemo_graph::GraphStore;
use mnemo_llm::LlmProvider;
use mnemo_retrieval::RetrievalService;

pub struct AppState {
    pub config: MnemoConfig,
    pub llm: Arc<dyn LlmProvider>,
    pub embedding: Arc<EmbeddingClient>,
    pub graph: Arc<GraphStore>,
    pub conversation: ConversationTracker,
    pub extraction: ExtractionService,
    pub retrieval: RetrievalService,
    pub budget: BudgetManager,
    pub backfill: BackfillHandle,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: MnemoConfig,
        llm: Arc<dyn LlmProvider>,
        embedding: Arc<EmbeddingClient>,
        graph: Arc<GraphStore>,
        conversation: ConversationTracker,
        extraction: ExtractionService,
        retrieval: RetrievalService,
        budget: BudgetManager,
        backfill: BackfillHandle,
    ) -> Self {
        Self {
            config,
            llm,
            embedding,
            graph,
            conversation,
            extraction,
            retrieval,
            budget,
            backfill,
        }
    }
}

/// Assembles the full Axum router, mirroring
/// `skynet-gateway::app::build_router`'s flat route table plus a tracing
/// layer.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(crate::http::openai_compat::chat_completions))
        .route("/v1/models", get(crate::http::models::list_models))
        .route("/healthz", get(crate::http::health::healthz))
        .route("/v1/admin/backfill/retry", post(crate::http::admin::retry_backfill))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
