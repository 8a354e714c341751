//! Embedding generation client (`spec.md` §4.5, "Embedding Client Wrapper").
//! Grounded on `ollama_client.py` for retry/error-classification semantics
//! and on `skynet-channels::manager::connect_with_backoff` for the backoff
//! and jitter implementation itself.

use mnemo_core::config::EMBEDDING_DIMENSION;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::error::{EmbeddingError, Result};

const MAX_BATCH_SIZE: usize = 10;
const INITIAL_RETRY_DELAY_SECS: f64 = 1.0;
const MAX_RETRY_DELAY_SECS: f64 = 30.0;
const JITTER_FRACTION: f64 = 0.10;

pub struct EmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbedRequestBody<'a> {
    model: &'a str,
    input: EmbedInput<'a>,
    truncate: bool,
    dimensions: u32,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbedInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Deserialize)]
struct EmbedResponseBody {
    embeddings: Vec<Vec<f32>>,
}

impl EmbeddingClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout_seconds: u64, max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_retries,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let body = EmbedRequestBody {
            model: &self.model,
            input: EmbedInput::Single(text),
            truncate: true,
            dimensions: EMBEDDING_DIMENSION as u32,
        };

        let response = self.request_with_retry(&body).await?;
        let embedding = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Validation("no embeddings in response".to_string()))?;

        validate_dimension(&embedding)?;
        Ok(embedding)
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyText);
        }
        if texts.len() > MAX_BATCH_SIZE {
            return Err(EmbeddingError::BatchTooLarge(texts.len(), MAX_BATCH_SIZE));
        }

        let body = EmbedRequestBody {
            model: &self.model,
            input: EmbedInput::Batch(texts),
            truncate: true,
            dimensions: EMBEDDING_DIMENSION as u32,
        };

        let response = self.request_with_retry(&body).await?;
        if response.embeddings.len() != texts.len() {
            return Err(EmbeddingError::Validation(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        for embedding in &response.embeddings {
            validate_dimension(embedding)?;
        }
        Ok(response.embeddings)
    }

    async fn request_with_retry(&self, body: &EmbedRequestBody<'_>) -> Result<EmbedResponseBody> {
        let mut delay_secs = INITIAL_RETRY_DELAY_SECS;

        for attempt in 1..=self.max_retries.max(1) {
            match self.execute_request(body).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.recoverable() => {
                    warn!(error = %e, "non-recoverable embedding error");
                    return Err(e);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    let jitter = jitter_secs(delay_secs);
                    let total = delay_secs + jitter;
                    warn!(
                        attempt,
                        max = self.max_retries,
                        error = %e,
                        retry_after_secs = total,
                        "embedding request failed, retrying with backoff"
                    );
                    sleep(Duration::from_secs_f64(total)).await;
                    delay_secs = (delay_secs * 2.0).min(MAX_RETRY_DELAY_SECS);
                }
            }
        }

        unreachable!("retry loop exited without returning")
    }

    async fn execute_request(&self, body: &EmbedRequestBody<'_>) -> Result<EmbedResponseBody> {
        let url = format!("{}/api/embed", self.base_url);
        let result = self.client.post(&url).json(body).send().await;

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(EmbeddingError::Timeout(e.to_string()));
            }
            Err(e) if e.is_connect() => {
                return Err(EmbeddingError::Connection(e.to_string()));
            }
            Err(e) => return Err(EmbeddingError::Unknown(e.to_string())),
        };

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(EmbeddingError::Model(format!("model '{}' not found", self.model)));
        }
        if status.is_server_error() {
            return Err(EmbeddingError::Model(format!("server error: {status}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Unknown(format!("HTTP {status}: {text}")));
        }

        response
            .json()
            .await
            .map_err(|e| EmbeddingError::Unknown(e.to_string()))
    }

    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("embedding service health check: OK");
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "embedding service health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "embedding service health check failed");
                false
            }
        }
    }
}

fn validate_dimension(embedding: &[f32]) -> Result<()> {
    if embedding.len() != EMBEDDING_DIMENSION {
        return Err(EmbeddingError::Validation(format!(
            "expected {EMBEDDING_DIMENSION} dimensions, got {}",
            embedding.len()
        )));
    }
    Ok(())
}

/// Pseudo-random jitter derived from the current timestamp, avoiding a
/// `rand` dependency for this narrow use.
fn jitter_secs(base_secs: f64) -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = base_secs * JITTER_FRACTION;
    if max_jitter <= 0.0 {
        return 0.0;
    }
    (nanos as f64 % (max_jitter * 1000.0)) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_batch() {
        let client = EmbeddingClient::new("http://localhost:11434", "nomic-embed-text", 30, 3);
        let texts: Vec<String> = (0..11).map(|i| format!("text {i}")).collect();
        let err = tokio_test_block_on(client.embed_batch(&texts));
        assert!(matches!(err, Err(EmbeddingError::BatchTooLarge(11, 10))));
    }

    #[test]
    fn rejects_empty_text() {
        let client = EmbeddingClient::new("http://localhost:11434", "nomic-embed-text", 30, 3);
        let err = tokio_test_block_on(client.embed(""));
        assert!(matches!(err, Err(EmbeddingError::EmptyText)));
    }

    #[test]
    fn dimension_validation_rejects_wrong_size() {
        let v: Vec<f32> = vec![0.0; 100];
        assert!(validate_dimension(&v).is_err());
    }

    fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f)
    }
}
