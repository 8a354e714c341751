use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mnemo_backfill::{BackfillEngine, BackfillHandle};
use mnemo_boundary::BoundaryThresholds;
use mnemo_conversation::{ConversationTracker, FsTranscriptSink};
use mnemo_core::MnemoConfig;
use mnemo_embedding::EmbeddingClient;
use mnemo_extraction::ExtractionService;
use mnemo_graph::{GraphConfig, GraphStore};
use mnemo_llm::HttpChatProvider;
use mnemo_retrieval::RetrievalService;
use tracing::{info, warn};

mod app;
mod http;
mod ingest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mnemo_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("MNEMO_CONFIG").ok();
    let config = MnemoConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        MnemoConfig::default()
    });

    let llm = Arc::new(HttpChatProvider::new(
        "primary",
        config.llm_base_url.clone(),
        config.llm_api_key.clone(),
        config.llm_timeout_seconds,
    ));

    let embedding = Arc::new(EmbeddingClient::new(
        config.embedding_base_url.clone(),
        config.embedding_model.clone(),
        config.llm_timeout_seconds,
        config.embedding_max_retries,
    ));

    let graph = Arc::new(
        GraphStore::connect(GraphConfig {
            uri: config.graph_uri.clone(),
            user: config.graph_user.clone(),
            password: config.graph_password.clone(),
        })
        .await?,
    );

    let sink = Arc::new(FsTranscriptSink::new(config.transcript_dir.clone()));
    let conversation = ConversationTracker::new(
        sink,
        config.max_tracked_sessions,
        BoundaryThresholds {
            idle_minutes: config.boundary_idle_minutes,
            drop_fraction: config.boundary_drop_fraction,
        },
    );

    let extraction_model = mnemo_llm::ModelSelector::parse(&config.model_selection)
        .map_err(anyhow::Error::msg)?
        .model;
    let extraction = ExtractionService::new(llm.clone(), extraction_model, config.extraction_min_confidence);

    let retrieval = RetrievalService::new(embedding.clone(), graph.clone(), config.score_weights());

    let budget = mnemo_budget::BudgetManager::new(config.token_budget, config.token_buffer);

    let backfill_handle = BackfillHandle::new(embedding.clone(), graph.clone(), config.embedding_model.clone());
    let backfill_engine = BackfillEngine::new(
        backfill_handle.clone(),
        config.backfill_batch_size,
        Duration::from_secs(config.backfill_poll_interval_seconds),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(backfill_engine.run(shutdown_rx));

    let state = Arc::new(app::AppState::new(
        config.clone(),
        llm,
        embedding,
        graph,
        conversation,
        extraction,
        retrieval,
        budget,
        backfill_handle,
    ));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("mnemo gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, router);

    tokio::select! {
        result = server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    }

    Ok(())
}
