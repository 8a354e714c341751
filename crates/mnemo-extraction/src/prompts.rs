//! Prompt construction for the extraction agent (`spec.md` §4.13,
//! "Extraction prompt construction" — provider-agnostic, mirroring the split
//! between `LlmProvider` and a concrete adapter).

use mnemo_core::Transcript;

pub fn system_prompt() -> String {
    r#"You are a memory extraction specialist analyzing conversation transcripts.

Identify and extract meaningful information about the user, categorizing
memories and assigning confidence scores based on evidence strength.

## Memory Categories

1. preference: Tool choices, workflow preferences, conventions.
2. personal_fact: Personal information, interests, hobbies (non-technical).
3. technical_context: Infrastructure, dependencies, architectures.
4. decision: Architecture decisions, tool selections with rationale.
5. correction: Corrections of previously stated information.

## Confidence Scoring Guidelines

- 0.8-1.0: explicit, direct statements.
- 0.6-0.7: strong implications or repeated mentions.
- 0.4-0.5: reasonable inferences from context.
- Below 0.4: do not extract.

## Extraction Rules

1. Only extract genuinely useful, user-specific information.
2. Mark is_explicit=true for first-person direct declarations
   ("I prefer", "I use", "My X is Y").
3. Detect corrections ("actually", "i meant", "correction", "sorry",
   "i misspoke", "no wait", "let me correct", "to be clear") and assign
   base_confidence 0.8.
4. Write content in third person: "User prefers Docker".
5. Include useful metadata: is_explicit, mention_count, source_messages.

## Output Format

Respond with a JSON object: {"memories": [{"memory_type": ..., "content": ...,
"base_confidence": ..., "metadata": {...}}]}. Return an empty list if nothing
meaningful is present. Quality over quantity."#
        .to_string()
}

/// Renders a transcript into the user-turn prompt text. Sends only the
/// fields the model needs, to minimize token usage.
pub fn render_transcript_prompt(transcript: &Transcript) -> String {
    let conversation_id = transcript.conversation_id();
    let duration_seconds = (transcript.end_time - transcript.start_time).num_milliseconds() as f64 / 1000.0;

    let mut lines = vec![
        format!("# Conversation Transcript: {conversation_id}"),
        format!("Duration: {duration_seconds:.1} seconds"),
        format!("Messages: {}", transcript.message_count),
        String::new(),
        "## Messages:".to_string(),
        String::new(),
    ];

    for (i, msg) in transcript.messages.iter().enumerate() {
        let timestamp = msg.timestamp.format("%H:%M:%S");
        lines.push(format!("[{}] {timestamp} - {}: {}", i + 1, msg.role, msg.content));
    }

    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(String::new());
    lines.push("Analyze this conversation and extract all meaningful user memories.".to_string());
    lines.push("Return only memories with base_confidence >= 0.4.".to_string());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mnemo_core::{ConversationMessage, Role, SessionId, TriggerReason};

    #[test]
    fn renders_numbered_message_lines() {
        let t = Transcript {
            session_id: SessionId::from("s1"),
            start_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 1, 0).unwrap(),
            message_count: 1,
            trigger_reason: TriggerReason::IdleAndHashChange,
            messages: vec![ConversationMessage {
                role: Role::User,
                content: "I prefer Docker".to_string(),
                timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 30).unwrap(),
            }],
        };
        let rendered = render_transcript_prompt(&t);
        assert!(rendered.contains("[1]"));
        assert!(rendered.contains("I prefer Docker"));
    }
}
