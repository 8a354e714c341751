//! OpenAI-compatible `/v1/chat/completions` endpoint. Streaming tasks
//! receive state via `Arc::clone` rather than a raw pointer cast — the
//! state is already `Arc`-wrapped, so this sidesteps the `'static` bound
//! on the spawned task without unsafe code.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures_util::Stream;
use mnemo_core::{ConversationMessage, CorrelationId, Role as CoreRole, SessionId};
use mnemo_llm::{ChatMessage, ChatRequest, ModelSelector, Role as LlmRole, StreamEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ingest;

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<OpenAiRequest>,
) -> Result<axum::response::Response, (StatusCode, Json<OpenAiError>)> {
    let last_user_message = req.last_user_message().ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(OpenAiError::new("no user message found", "invalid_request_error")),
        )
    })?;

    let session_id = resolve_session_id(&headers);
    let correlation_id = resolve_correlation_id(&headers);
    let now = chrono::Utc::now();

    info!(
        %session_id,
        %correlation_id,
        model = %req.model,
        stream = req.stream,
        "chat completions request"
    );

    let messages: Vec<ConversationMessage> = req
        .messages
        .iter()
        .map(|m| ConversationMessage {
            role: parse_role(m.role.as_deref().unwrap_or("user")),
            content: m.content.clone().unwrap_or_default(),
            timestamp: now,
        })
        .collect();

    // C2 bookkeeping and any follow-on ingestion run off the critical path
    // (`spec.md` §4.12 step 2): a boundary that closes a transcript here
    // must never add latency to this response.
    {
        let state = state.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            match state.conversation.process_request(session_id, messages, now).await {
                Ok(outcome) => {
                    if let Some(transcript) = outcome.closed_transcript {
                        ingest::ingest_transcript(state, transcript).await;
                    }
                }
                Err(e) => warn!(error = %e, "conversation tracker failed, request unaffected"),
            }
        });
    }

    let context = retrieve_context(&state, &last_user_message).await;

    let model_selector = ModelSelector::parse(&state.config.model_selection)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(OpenAiError::new(&e, "internal_error"))))?;

    let system_prompt = compose_system_prompt(&state, &context);
    let chat_messages: Vec<ChatMessage> = req
        .messages
        .iter()
        .map(|m| ChatMessage {
            role: to_llm_role(m.role.as_deref().unwrap_or("user")),
            content: m.content.clone().unwrap_or_default(),
        })
        .collect();

    let chat_req = ChatRequest {
        model: model_selector.model,
        system: system_prompt,
        messages: chat_messages,
        max_tokens: req.max_tokens,
        temperature: req.temperature,
    };

    if req.stream {
        Ok(handle_streaming(state.clone(), chat_req).await.into_response())
    } else {
        Ok(handle_non_streaming(&state, chat_req).await.into_response())
    }
}

/// Runs C8 for the last user message; any failure degrades to "no memory
/// context" per the retrieval service's fail-soft policy (`spec.md` §4.7).
async fn retrieve_context(state: &AppState, query_text: &str) -> String {
    let query = mnemo_core::RetrievalQuery {
        text: query_text.to_string(),
        top_k: state.config.retrieval_top_k,
        min_similarity: state.config.retrieval_min_similarity,
        min_confidence: 0.0,
        memory_types: None,
        precomputed_embedding: None,
    };

    let response = match state.retrieval.retrieve(query).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "retrieval failed, continuing without memory context");
            return String::new();
        }
    };

    if response.results.is_empty() {
        return String::new();
    }

    let strategy = match state.config.truncation_strategy.as_str() {
        "truncate" => mnemo_budget::TruncationStrategy::Truncate,
        _ => mnemo_budget::TruncationStrategy::HardCutoff,
    };
    let truncated = state.budget.apply_budget(
        response.results,
        Some(state.config.token_budget),
        strategy,
    );

    if truncated.is_empty() {
        return String::new();
    }

    // Access is recorded only for memories that survived budget truncation
    // into the final prompt, not merely because they were retrieved.
    let ids: Vec<_> = truncated.iter().map(|r| r.memory.memory_id.clone()).collect();
    state.retrieval.access_tracker().record_access_now(&ids).await;

    let mut block = String::from("Relevant memories about the user:\n");
    for result in &truncated {
        block.push_str(&format!("- {}\n", result.memory.content));
    }
    block
}

fn compose_system_prompt(state: &AppState, context: &str) -> String {
    let base = state
        .config
        .system_prompt
        .clone()
        .unwrap_or_else(|| "You are a helpful assistant.".to_string());
    if context.is_empty() {
        base
    } else {
        format!("{base}\n\n{context}")
    }
}

async fn handle_non_streaming(state: &AppState, req: ChatRequest) -> impl IntoResponse {
    match state.llm.send(&req).await {
        Ok(resp) => {
            let reply = OpenAiResponse {
                id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
                object: "chat.completion".to_string(),
                created: chrono::Utc::now().timestamp(),
                model: resp.model,
                choices: vec![Choice {
                    index: 0,
                    message: Some(OpenAiMessage {
                        role: Some("assistant".to_string()),
                        content: Some(resp.content),
                    }),
                    delta: None,
                    finish_reason: Some(resp.stop_reason),
                }],
                usage: Some(Usage {
                    prompt_tokens: resp.tokens_in,
                    completion_tokens: resp.tokens_out,
                    total_tokens: resp.tokens_in + resp.tokens_out,
                }),
            };
            (StatusCode::OK, Json(reply)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "chat completions failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(OpenAiError::new(&e.to_string(), "api_error")),
            )
                .into_response()
        }
    }
}

async fn handle_streaming(
    state: Arc<AppState>,
    req: ChatRequest,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4());
    let model = req.model.clone();

    tokio::spawn(async move {
        if let Err(e) = state.llm.send_stream(&req, tx).await {
            warn!(error = %e, "streaming chat completions failed");
        }
    });

    let stream = async_stream::stream! {
        let mut role_sent = false;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::TextDelta { text } => {
                    let delta = if role_sent {
                        OpenAiMessage { role: None, content: Some(text) }
                    } else {
                        role_sent = true;
                        OpenAiMessage { role: Some("assistant".to_string()), content: Some(text) }
                    };
                    let chunk = chunk_response(&id, &model, delta, None, None);
                    yield Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()));
                }
                StreamEvent::Done { tokens_in, tokens_out, stop_reason, .. } => {
                    let chunk = chunk_response(
                        &id,
                        &model,
                        OpenAiMessage { role: None, content: None },
                        Some(stop_reason),
                        Some(Usage {
                            prompt_tokens: tokens_in,
                            completion_tokens: tokens_out,
                            total_tokens: tokens_in + tokens_out,
                        }),
                    );
                    yield Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()));
                    yield Ok(Event::default().data("[DONE]"));
                }
                StreamEvent::Error { message } => {
                    let chunk = chunk_response(
                        &id,
                        &model,
                        OpenAiMessage { role: None, content: None },
                        Some("error".to_string()),
                        None,
                    );
                    warn!(%message, "stream producer reported an error");
                    yield Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()));
                    yield Ok(Event::default().data("[DONE]"));
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn chunk_response(
    id: &str,
    model: &str,
    delta: OpenAiMessage,
    finish_reason: Option<String>,
    usage: Option<Usage>,
) -> OpenAiResponse {
    OpenAiResponse {
        id: id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: None,
            delta: Some(delta),
            finish_reason,
        }],
        usage,
    }
}

fn resolve_session_id(headers: &HeaderMap) -> SessionId {
    if let Some(v) = headers.get("x-conversation-id").and_then(|v| v.to_str().ok()) {
        if !v.is_empty() {
            return SessionId::from(v.to_string());
        }
    }
    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("0.0.0.0");
    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok()).unwrap_or("");
    SessionId::synthesize(client_ip, user_agent)
}

fn resolve_correlation_id(headers: &HeaderMap) -> CorrelationId {
    headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| CorrelationId::from(v.to_string()))
        .unwrap_or_default()
}

fn parse_role(role: &str) -> CoreRole {
    match role {
        "assistant" => CoreRole::Assistant,
        "system" => CoreRole::System,
        _ => CoreRole::User,
    }
}

fn to_llm_role(role: &str) -> LlmRole {
    match role {
        "assistant" => LlmRole::Assistant,
        "system" => LlmRole::System,
        _ => LlmRole::User,
    }
}

// ── OpenAI API wire types (`spec.md` §6) ────────────────────────────────

#[derive(Deserialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    1024
}

impl OpenAiRequest {
    fn last_user_message(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role.as_deref() == Some("user"))
            .and_then(|m| m.content.clone())
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct OpenAiMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Serialize)]
struct OpenAiResponse {
    id: String,
    object: String,
    created: i64,
    model: String,
    choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<Usage>,
}

#[derive(Serialize)]
struct Choice {
    index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delta: Option<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_reason: Option<String>,
}

#[derive(Serialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Serialize)]
pub struct OpenAiError {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

impl OpenAiError {
    fn new(message: &str, error_type: &str) -> Self {
        Self {
            error: ErrorBody {
                message: message.to_string(),
                error_type: error_type.to_string(),
            },
        }
    }
}
