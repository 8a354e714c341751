//! Shared data model: `spec.md` §3 ("Data Model"). Kept in `mnemo-core` so
//! that the component crates (boundary, extraction, graph, dedup, rank,
//! budget, retrieval) can pass the same types around without depending on
//! each other.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, MemoryId, SessionId};

/// The five kinds of memory a transcript can yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Preference,
    PersonalFact,
    TechnicalContext,
    Decision,
    Correction,
}

impl MemoryType {
    pub fn is_correction(&self) -> bool {
        matches!(self, MemoryType::Correction)
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryType::Preference => "preference",
            MemoryType::PersonalFact => "personal_fact",
            MemoryType::TechnicalContext => "technical_context",
            MemoryType::Decision => "decision",
            MemoryType::Correction => "correction",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preference" => Ok(MemoryType::Preference),
            "personal_fact" => Ok(MemoryType::PersonalFact),
            "technical_context" => Ok(MemoryType::TechnicalContext),
            "decision" => Ok(MemoryType::Decision),
            "correction" => Ok(MemoryType::Correction),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// Resolution for the "dynamically-shaped metadata dictionary" redesign
/// flag: a typed side table for well-known fields plus pass-through storage
/// for anything else the extractor attaches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetadata(BTreeMap<String, serde_json::Value>);

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// `metadata.supersedes` — the id of the memory this candidate corrects,
    /// as asserted by the extractor (not yet verified against the store).
    pub fn supersedes_hint(&self) -> Option<MemoryId> {
        self.0
            .get("supersedes")
            .and_then(|v| v.as_str())
            .map(MemoryId::from)
    }

    pub fn set_supersedes_hint(&mut self, id: &MemoryId) {
        self.set("supersedes", id.as_str().to_string());
    }

    pub fn is_explicit(&self) -> bool {
        self.0
            .get("is_explicit")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_is_explicit(&mut self, explicit: bool) {
        self.set("is_explicit", explicit);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// The central persisted entity (`spec.md` §3, "Memory Record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub memory_id: MemoryId,
    pub memory_type: MemoryType,
    pub content: String,
    pub confidence: f64,
    pub category: Option<String>,
    pub source_conversation_id: ConversationId,
    pub extraction_timestamp: DateTime<Utc>,
    pub learned_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub supersedes: Option<MemoryId>,
    pub superseded_by: Option<MemoryId>,
    pub embedding: Option<Vec<f32>>,
    pub has_embedding: bool,
    pub embedding_version: Option<String>,
    pub embedding_updated_at: Option<DateTime<Utc>>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub metadata: MemoryMetadata,
}

/// Floor below which a memory record is never persisted (`spec.md` §3, §4.3).
pub const MIN_PERSISTED_CONFIDENCE: f64 = 0.4;

impl MemoryRecord {
    /// Constructs a record, rejecting it outright if confidence falls below
    /// the persistence floor — the "exception for control flow becomes a
    /// result-bearing constructor" redesign flag.
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        memory_type: MemoryType,
        content: String,
        confidence: f64,
        category: Option<String>,
        source_conversation_id: ConversationId,
        now: DateTime<Utc>,
        metadata: MemoryMetadata,
    ) -> Result<Self, BelowConfidenceThreshold> {
        if confidence < MIN_PERSISTED_CONFIDENCE {
            return Err(BelowConfidenceThreshold { confidence });
        }
        Ok(Self {
            memory_id: MemoryId::new(),
            memory_type,
            content,
            confidence,
            category,
            source_conversation_id,
            extraction_timestamp: now,
            learned_at: now,
            valid_from: now,
            valid_until: None,
            supersedes: None,
            superseded_by: None,
            embedding: None,
            has_embedding: false,
            embedding_version: None,
            embedding_updated_at: None,
            last_accessed: None,
            access_count: 0,
            metadata,
        })
    }

    pub fn is_currently_valid(&self) -> bool {
        self.valid_until.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BelowConfidenceThreshold {
    pub confidence: f64,
}

impl fmt::Display for BelowConfidenceThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "confidence {:.2} is below the persistence floor {:.2}",
            self.confidence, MIN_PERSISTED_CONFIDENCE
        )
    }
}

impl std::error::Error for BelowConfidenceThreshold {}

/// One chat message, as buffered by the Conversation Tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Why the Boundary Detector fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    IdleAndMessageDrop,
    IdleAndHashChange,
    IdleAndBoth,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerReason::IdleAndMessageDrop => "idle_and_message_drop",
            TriggerReason::IdleAndHashChange => "idle_and_hash_change",
            TriggerReason::IdleAndBoth => "idle_and_both",
        };
        write!(f, "{s}")
    }
}

/// The immutable record of one closed conversation (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: SessionId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub message_count: usize,
    pub trigger_reason: TriggerReason,
    pub messages: Vec<ConversationMessage>,
}

impl Transcript {
    pub fn conversation_id(&self) -> ConversationId {
        ConversationId::from_session(&self.session_id, self.end_time)
    }
}

/// In-memory, per active conversation (`spec.md` §3, "Session Metadata").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: SessionId,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_message_count: usize,
    pub first_message_hash: String,
}

impl SessionMetadata {
    pub fn invariant_holds(&self) -> bool {
        self.first_seen <= self.last_seen && self.last_message_count >= 1
    }
}
