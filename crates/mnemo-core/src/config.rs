use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const EMBEDDING_DIMENSION: usize = 768;

/// Top-level config (`mnemo.toml` + `MNEMO_*` env overrides), surfacing
/// every variable named in `spec.md` §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MnemoConfig {
    /// `provider:model`, e.g. `"anthropic:claude-haiku-4-5"`.
    #[serde(default = "default_model_selection")]
    pub model_selection: String,
    #[serde(default = "default_embedding_base_url")]
    pub embedding_base_url: String,
    #[serde(default = "default_llm_timeout_seconds")]
    pub llm_timeout_seconds: u64,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub profile_path: Option<String>,
    #[serde(default = "default_context_window_messages")]
    pub context_window_messages: usize,
    #[serde(default = "default_graph_uri")]
    pub graph_uri: String,
    #[serde(default = "default_graph_user")]
    pub graph_user: String,
    #[serde(default)]
    pub graph_password: String,
    #[serde(default = "default_transcript_dir")]
    pub transcript_dir: String,
    #[serde(default = "default_boundary_idle_minutes")]
    pub boundary_idle_minutes: u32,
    #[serde(default = "default_boundary_drop_fraction")]
    pub boundary_drop_fraction: f64,
    #[serde(default = "default_max_tracked_sessions")]
    pub max_tracked_sessions: usize,
    #[serde(default = "default_extraction_min_confidence")]
    pub extraction_min_confidence: f64,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default)]
    pub llm_api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_max_retries")]
    pub embedding_max_retries: u32,
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    #[serde(default = "default_token_buffer")]
    pub token_buffer: usize,
    #[serde(default = "default_truncation_strategy")]
    pub truncation_strategy: String,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "default_retrieval_min_similarity")]
    pub retrieval_min_similarity: f64,
    #[serde(default = "default_dedup_similarity_threshold")]
    pub dedup_similarity_threshold: f64,
    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: usize,
    #[serde(default = "default_backfill_poll_interval_seconds")]
    pub backfill_poll_interval_seconds: u64,
    #[serde(default = "default_score_weight_similarity")]
    pub score_weight_similarity: f64,
    #[serde(default = "default_score_weight_confidence")]
    pub score_weight_confidence: f64,
    #[serde(default = "default_score_weight_recency")]
    pub score_weight_recency: f64,
    #[serde(default = "default_score_weight_frequency")]
    pub score_weight_frequency: f64,
}

impl Default for MnemoConfig {
    fn default() -> Self {
        Self {
            model_selection: default_model_selection(),
            embedding_base_url: default_embedding_base_url(),
            llm_timeout_seconds: default_llm_timeout_seconds(),
            system_prompt: None,
            profile_path: None,
            context_window_messages: default_context_window_messages(),
            graph_uri: default_graph_uri(),
            graph_user: default_graph_user(),
            graph_password: String::new(),
            transcript_dir: default_transcript_dir(),
            boundary_idle_minutes: default_boundary_idle_minutes(),
            boundary_drop_fraction: default_boundary_drop_fraction(),
            max_tracked_sessions: default_max_tracked_sessions(),
            extraction_min_confidence: default_extraction_min_confidence(),
            host: default_host(),
            port: default_port(),
            llm_base_url: default_llm_base_url(),
            llm_api_key: None,
            embedding_model: default_embedding_model(),
            embedding_max_retries: default_embedding_max_retries(),
            token_budget: default_token_budget(),
            token_buffer: default_token_buffer(),
            truncation_strategy: default_truncation_strategy(),
            retrieval_top_k: default_retrieval_top_k(),
            retrieval_min_similarity: default_retrieval_min_similarity(),
            dedup_similarity_threshold: default_dedup_similarity_threshold(),
            backfill_batch_size: default_backfill_batch_size(),
            backfill_poll_interval_seconds: default_backfill_poll_interval_seconds(),
            score_weight_similarity: default_score_weight_similarity(),
            score_weight_confidence: default_score_weight_confidence(),
            score_weight_recency: default_score_weight_recency(),
            score_weight_frequency: default_score_weight_frequency(),
        }
    }
}

fn default_model_selection() -> String {
    "anthropic:claude-haiku-4-5".to_string()
}
fn default_embedding_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_llm_timeout_seconds() -> u64 {
    30
}
fn default_context_window_messages() -> usize {
    20
}
fn default_graph_uri() -> String {
    "bolt://localhost:7687".to_string()
}
fn default_graph_user() -> String {
    "neo4j".to_string()
}
fn default_transcript_dir() -> String {
    "./transcripts".to_string()
}
fn default_boundary_idle_minutes() -> u32 {
    10
}
fn default_boundary_drop_fraction() -> f64 {
    0.5
}
fn default_max_tracked_sessions() -> usize {
    1000
}
fn default_extraction_min_confidence() -> f64 {
    0.4
}
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_llm_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_embedding_max_retries() -> u32 {
    3
}
fn default_token_budget() -> usize {
    2000
}
fn default_token_buffer() -> usize {
    50
}
fn default_truncation_strategy() -> String {
    "hard_cutoff".to_string()
}
fn default_retrieval_top_k() -> usize {
    10
}
fn default_retrieval_min_similarity() -> f64 {
    0.65
}
fn default_dedup_similarity_threshold() -> f64 {
    0.92
}
fn default_backfill_batch_size() -> usize {
    20
}
fn default_backfill_poll_interval_seconds() -> u64 {
    60
}
fn default_score_weight_similarity() -> f64 {
    0.40
}
fn default_score_weight_confidence() -> f64 {
    0.25
}
fn default_score_weight_recency() -> f64 {
    0.20
}
fn default_score_weight_frequency() -> f64 {
    0.15
}

impl MnemoConfig {
    /// Load config: explicit path > `MNEMO_CONFIG` env > `./mnemo.toml` > defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("MNEMO_CONFIG").ok())
            .unwrap_or_else(|| "./mnemo.toml".to_string());

        let config: MnemoConfig = Figment::from(figment::providers::Serialized::defaults(
            MnemoConfig::default(),
        ))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("MNEMO_").split("_"))
        .extract()
        .map_err(|e| crate::error::MnemoError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Range checks named in `spec.md` §6.
    pub fn validate(&self) -> crate::error::Result<()> {
        fn in_range<T: PartialOrd + std::fmt::Display>(
            name: &str,
            value: T,
            lo: T,
            hi: T,
        ) -> crate::error::Result<()> {
            if value < lo || value > hi {
                return Err(crate::error::MnemoError::Config(format!(
                    "{name}={value} out of range [{lo}, {hi}]"
                )));
            }
            Ok(())
        }

        in_range(
            "LLM_TIMEOUT_SECONDS",
            self.llm_timeout_seconds,
            1,
            600,
        )?;
        in_range(
            "BOUNDARY_IDLE_MINUTES",
            self.boundary_idle_minutes,
            1,
            1440,
        )?;
        in_range(
            "BOUNDARY_DROP_FRACTION",
            self.boundary_drop_fraction,
            0.0,
            1.0,
        )?;
        in_range(
            "MAX_TRACKED_SESSIONS",
            self.max_tracked_sessions,
            10,
            100_000,
        )?;
        in_range(
            "EXTRACTION_MIN_CONFIDENCE",
            self.extraction_min_confidence,
            0.0,
            1.0,
        )?;
        if !self.model_selection.contains(':') {
            return Err(crate::error::MnemoError::Config(
                "MODEL_SELECTION must be of the form provider:model".to_string(),
            ));
        }
        if self.truncation_strategy != "hard_cutoff" && self.truncation_strategy != "truncate" {
            return Err(crate::error::MnemoError::Config(format!(
                "TRUNCATION_STRATEGY must be 'hard_cutoff' or 'truncate', got '{}'",
                self.truncation_strategy
            )));
        }
        Ok(())
    }

    pub fn score_weights(&self) -> crate::retrieval::ScoreWeights {
        crate::retrieval::ScoreWeights {
            similarity: self.score_weight_similarity,
            confidence: self.score_weight_confidence,
            recency: self.score_weight_recency,
            frequency: self.score_weight_frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(MnemoConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_drop_fraction() {
        let mut cfg = MnemoConfig::default();
        cfg.boundary_drop_fraction = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_malformed_model_selection() {
        let mut cfg = MnemoConfig::default();
        cfg.model_selection = "claude-haiku-4-5".to_string();
        assert!(cfg.validate().is_err());
    }
}
