//! A single OpenAI-compatible HTTP adapter, covering both chat and
//! structured extraction. This is the one concrete implementation shipped
//! with the workspace; it is deliberately provider-agnostic (works against
//! Ollama, vLLM, or any `/v1/chat/completions`-speaking endpoint) rather
//! than hard-coding a single vendor, since `spec.md` treats the LLM client
//! as an out-of-scope collaborator specified only by this trait.

use async_trait::async_trait;
use mnemo_core::{MemoryMetadata, MemoryType};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::{ExtractionCandidate, ExtractionRequest, LlmProvider};
use crate::types::{ChatRequest, ChatResponse, ProviderError, Role};

pub struct HttpChatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    name: String,
}

impl HttpChatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: Option<String>, timeout_seconds: u64) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            name: name.into(),
        }
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatApiResponse {
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

#[async_trait]
impl LlmProvider for HttpChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut messages = vec![WireMessage {
            role: "system",
            content: &req.system,
        }];
        messages.extend(req.messages.iter().map(|m| WireMessage {
            role: role_str(m.role),
            content: &m.content,
        }));

        let body = ChatBody {
            model: &req.model,
            messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            response_format: None,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %req.model, provider = %self.name, "sending chat request");

        let builder = self.client.post(&url).json(&body);
        let resp = self.apply_auth(builder).send().await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry,
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, provider = %self.name, "LLM API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let choice = api_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("empty choices array".to_string()))?;

        Ok(ChatResponse {
            content: choice.message.content,
            model: api_resp.model.unwrap_or_else(|| req.model.clone()),
            tokens_in: api_resp
                .usage
                .as_ref()
                .and_then(|u| u.prompt_tokens)
                .unwrap_or(0),
            tokens_out: api_resp
                .usage
                .as_ref()
                .and_then(|u| u.completion_tokens)
                .unwrap_or(0),
            stop_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
        })
    }

    async fn extract(
        &self,
        req: &ExtractionRequest,
    ) -> Result<Vec<ExtractionCandidate>, ProviderError> {
        let body = ChatBody {
            model: &req.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &req.system_prompt,
                },
                WireMessage {
                    role: "user",
                    content: &req.transcript_prompt,
                },
            ],
            max_tokens: 2048,
            temperature: Some(0.0),
            response_format: Some(serde_json::json!({ "type": "json_object" })),
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let builder = self.client.post(&url).json(&body);
        let resp = self.apply_auth(builder).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ChatApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let raw = api_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        parse_extraction_payload(&raw)
    }
}

#[derive(Deserialize)]
struct RawExtractionPayload {
    memories: Vec<RawCandidate>,
}

#[derive(Deserialize)]
struct RawCandidate {
    memory_type: String,
    content: String,
    base_confidence: f64,
    #[serde(default)]
    metadata: std::collections::BTreeMap<String, serde_json::Value>,
}

fn parse_extraction_payload(raw: &str) -> Result<Vec<ExtractionCandidate>, ProviderError> {
    let payload: RawExtractionPayload =
        serde_json::from_str(raw).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let mut candidates = Vec::with_capacity(payload.memories.len());
    for item in payload.memories {
        let memory_type: MemoryType = item
            .memory_type
            .parse()
            .map_err(ProviderError::Parse)?;
        let mut metadata = MemoryMetadata::new();
        for (k, v) in item.metadata {
            metadata.set(k, v);
        }
        candidates.push(ExtractionCandidate {
            memory_type,
            content: item.content,
            base_confidence: item.base_confidence,
            metadata,
        });
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_extraction_payload() {
        let raw = r#"{"memories":[{"memory_type":"preference","content":"User prefers Docker","base_confidence":0.7,"metadata":{"is_explicit":true}}]}"#;
        let candidates = parse_extraction_payload(raw).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].memory_type, MemoryType::Preference);
        assert!(candidates[0].metadata.is_explicit());
    }

    #[test]
    fn rejects_unknown_memory_type() {
        let raw = r#"{"memories":[{"memory_type":"bogus","content":"x","base_confidence":0.7,"metadata":{}}]}"#;
        assert!(parse_extraction_payload(raw).is_err());
    }
}
