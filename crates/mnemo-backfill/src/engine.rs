//! Embedding backfill worker (`spec.md` §4.7, "Backfill Worker"). The
//! engine/handle split and `tokio::select!` shutdown loop mirror
//! `skynet-scheduler::engine::SchedulerEngine`; batching, dead-letter
//! retry, and progress reporting are ported from `backfill_worker.py`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mnemo_graph::PendingEmbedding;
use tokio::sync::{watch, Mutex};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use mnemo_embedding::EmbeddingClient;
use mnemo_graph::GraphStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    pub processed: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub processed: u64,
    pub failed: u64,
    pub total: u64,
    pub success_rate: f64,
    pub dead_letter_queue_size: usize,
}

struct Inner {
    processed_count: AtomicU64,
    failed_count: AtomicU64,
    dead_letter_queue: Mutex<Vec<PendingEmbedding>>,
}

/// Cheaply cloneable handle for querying progress and triggering a manual
/// dead-letter retry while the engine loop runs elsewhere.
#[derive(Clone)]
pub struct BackfillHandle {
    inner: Arc<Inner>,
    embedding: Arc<EmbeddingClient>,
    graph: Arc<GraphStore>,
    embedding_version: String,
}

impl BackfillHandle {
    pub fn new(embedding: Arc<EmbeddingClient>, graph: Arc<GraphStore>, embedding_version: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                processed_count: AtomicU64::new(0),
                failed_count: AtomicU64::new(0),
                dead_letter_queue: Mutex::new(Vec::new()),
            }),
            embedding,
            graph,
            embedding_version: embedding_version.into(),
        }
    }

    pub fn progress(&self) -> Progress {
        let processed = self.inner.processed_count.load(Ordering::Relaxed);
        let failed = self.inner.failed_count.load(Ordering::Relaxed);
        let total = processed + failed;
        let success_rate = if total > 0 {
            processed as f64 / total as f64
        } else {
            0.0
        };
        let dead_letter_queue_size = self.inner.dead_letter_queue.try_lock().map(|q| q.len()).unwrap_or(0);
        Progress {
            processed,
            failed,
            total,
            success_rate,
            dead_letter_queue_size,
        }
    }

    pub async fn health_check(&self) -> bool {
        let embedding_ok = self.embedding.health_check().await;
        let graph_ok = self.graph.health_check().await;
        embedding_ok && graph_ok
    }

    /// Processes one memory: embeds its content and persists the vector.
    /// On any failure, appends the item to the dead-letter queue.
    async fn process_one(&self, item: PendingEmbedding) -> bool {
        let embedding = match self.embedding.embed(&item.content).await {
            Ok(e) => e,
            Err(e) => {
                warn!(memory_id = %item.memory_id, error = %e, "failed to embed memory");
                self.inner.failed_count.fetch_add(1, Ordering::Relaxed);
                self.inner.dead_letter_queue.lock().await.push(item);
                return false;
            }
        };

        match self
            .graph
            .store_embedding(&item.memory_id, &embedding, &self.embedding_version)
            .await
        {
            Ok(true) => {
                self.inner.processed_count.fetch_add(1, Ordering::Relaxed);
                true
            }
            Ok(false) => {
                warn!(memory_id = %item.memory_id, "memory not found when storing embedding");
                self.inner.failed_count.fetch_add(1, Ordering::Relaxed);
                self.inner.dead_letter_queue.lock().await.push(item);
                false
            }
            Err(e) => {
                warn!(memory_id = %item.memory_id, error = %e, "failed to store embedding");
                self.inner.failed_count.fetch_add(1, Ordering::Relaxed);
                self.inner.dead_letter_queue.lock().await.push(item);
                false
            }
        }
    }

    async fn process_batch(&self, batch: Vec<PendingEmbedding>) -> BatchOutcome {
        if batch.is_empty() {
            return BatchOutcome::default();
        }

        info!(count = batch.len(), "processing backfill batch");
        let mut outcome = BatchOutcome::default();

        for item in batch {
            if item.content.trim().is_empty() {
                outcome.skipped += 1;
                continue;
            }
            if self.process_one(item).await {
                outcome.processed += 1;
            } else {
                outcome.failed += 1;
            }
        }

        outcome
    }

    /// Explicit dead-letter retry, exposed as `POST /v1/admin/backfill/retry`.
    pub async fn retry_dead_letter(&self) -> BatchOutcome {
        let to_retry = {
            let mut queue = self.inner.dead_letter_queue.lock().await;
            std::mem::take(&mut *queue)
        };

        if to_retry.is_empty() {
            return BatchOutcome::default();
        }

        info!(count = to_retry.len(), "retrying dead-letter queue");
        self.process_batch(to_retry).await
    }
}

/// Background poll loop. Consumes `self` the way `SchedulerEngine::run`
/// does, taking a `watch::Receiver<bool>` for graceful shutdown.
pub struct BackfillEngine {
    handle: BackfillHandle,
    batch_size: usize,
    poll_interval: Duration,
}

impl BackfillEngine {
    pub fn new(handle: BackfillHandle, batch_size: usize, poll_interval: Duration) -> Self {
        Self {
            handle,
            batch_size,
            poll_interval,
        }
    }

    pub fn handle(&self) -> BackfillHandle {
        self.handle.clone()
    }

    async fn get_next_batch(&self) -> Vec<PendingEmbedding> {
        match self.handle.graph.memories_without_embeddings(self.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "failed to fetch backfill batch");
                Vec::new()
            }
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("embedding backfill worker started");
        let mut ticker = interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let batch = self.get_next_batch().await;
                    if batch.is_empty() {
                        debug!(poll_interval_secs = self.poll_interval.as_secs(), "no memories to backfill");
                        continue;
                    }
                    let outcome = self.handle.process_batch(batch).await;
                    info!(
                        processed = outcome.processed,
                        failed = outcome.failed,
                        skipped = outcome.skipped,
                        "backfill batch complete"
                    );
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("embedding backfill worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
