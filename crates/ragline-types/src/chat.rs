//! Conversation message and turn types.
//!
//! A conversation is an ordered list of [`Message`]s. User messages are
//! appended on submit; system messages only once the generation channel
//! delivers a terminal frame. [`TurnPhase`] and [`TurnId`] describe where the
//! orchestrator is within the current query/answer cycle.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::retrieval::DocumentChunk;

/// Author of a message.
///
/// Alternation is not enforced: consecutive system messages are legal
/// (e.g. replies served from the backend cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "system" => Ok(MessageRole::System),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// Body of a message: plain text, or a list of scored document references
/// when a raw retrieval result is surfaced as a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Chunks(Vec<DocumentChunk>),
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// One turn in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
    /// True only on system messages served from a precomputed cache.
    #[serde(default)]
    pub cached: bool,
    /// Similarity score of the cache hit; present only when `cached` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(text.into()),
            cached: false,
            distance: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(text.into()),
            cached: false,
            distance: None,
        }
    }

    /// A system message answered from the backend cache.
    ///
    /// `distance` is dropped unless `cached` is true, so a fresh answer never
    /// carries a stray score.
    pub fn generated(text: impl Into<String>, cached: bool, distance: Option<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(text.into()),
            cached,
            distance: if cached { distance } else { None },
        }
    }

    /// A message carrying retrieved document references instead of text.
    pub fn evidence(chunks: Vec<DocumentChunk>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Chunks(chunks),
            cached: false,
            distance: None,
        }
    }

    /// The text body, if this is a text message.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Chunks(_) => None,
        }
    }
}

/// Phase of the current turn. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    #[default]
    Idle,
    Retrieving,
    Streaming,
}

impl TurnPhase {
    pub fn is_idle(self) -> bool {
        self == TurnPhase::Idle
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::Idle => write!(f, "idle"),
            TurnPhase::Retrieving => write!(f, "retrieving"),
            TurnPhase::Streaming => write!(f, "streaming"),
        }
    }
}

/// Monotonically increasing identifier assigned to each accepted submit.
///
/// Every asynchronous result is tagged with the turn that started it; results
/// whose turn no longer matches the orchestrator's current turn are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl TurnId {
    pub fn next(self) -> Self {
        TurnId(self.0 + 1)
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::User, MessageRole::System] {
            let parsed: MessageRole = role.to_string().parse().unwrap();
            assert_eq!(role, parsed);
        }
        assert!("assistant".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_user_message_serializes_without_distance() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
        assert_eq!(json["cached"], false);
        assert!(json.get("distance").is_none());
    }

    #[test]
    fn test_generated_drops_distance_when_not_cached() {
        let fresh = Message::generated("answer", false, Some("0.12".to_string()));
        assert_eq!(fresh.distance, None);

        let cached = Message::generated("answer", true, Some("0.12".to_string()));
        assert!(cached.cached);
        assert_eq!(cached.distance.as_deref(), Some("0.12"));
    }

    #[test]
    fn test_content_untagged_deserialize() {
        let text: Message =
            serde_json::from_str(r#"{"role":"system","content":"hello"}"#).unwrap();
        assert_eq!(text.text(), Some("hello"));
        assert!(!text.cached);

        let chunks: Message = serde_json::from_str(
            r#"{"role":"system","content":[{"doc_name":"a.md","doc_uuid":"u1","chunk_id":3,"score":0.9,"text":"x"}]}"#,
        )
        .unwrap();
        match chunks.content {
            MessageContent::Chunks(c) => {
                assert_eq!(c.len(), 1);
                assert_eq!(c[0].chunk_id, "3");
            }
            MessageContent::Text(_) => panic!("expected chunk content"),
        }
    }

    #[test]
    fn test_turn_phase_default_is_idle() {
        assert_eq!(TurnPhase::default(), TurnPhase::Idle);
        assert!(TurnPhase::Idle.is_idle());
        assert!(!TurnPhase::Streaming.is_idle());
        assert_eq!(TurnPhase::Retrieving.to_string(), "retrieving");
    }

    #[test]
    fn test_turn_id_next_is_monotonic() {
        let t = TurnId::default();
        assert!(t.next() > t);
        assert_eq!(t.next().next(), TurnId(2));
    }
}
