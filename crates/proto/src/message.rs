use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::turn::ScratchpadEntry;

/// Unique identifier for a conversation session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Creates a new random session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message authored by the human.
    User,
    /// Message authored by the assistant.
    Assistant,
}

/// A role-tagged utterance in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Semantic role of this message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Tool calls made while producing an assistant message. Always empty for users.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<ScratchpadEntry>,
    /// Message creation timestamp in UTC.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            trace: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Creates an assistant message without a trace.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::assistant_with_trace(content, Vec::new())
    }

    /// Creates an assistant message carrying the tool calls of its turn.
    pub fn assistant_with_trace(content: impl Into<String>, trace: Vec<ScratchpadEntry>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            trace,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_new_creates_non_empty_value() {
        let session = SessionId::new();
        assert!(!session.0.is_empty());
        assert_ne!(session, SessionId::new());
    }

    #[test]
    fn user_message_has_no_trace() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "hello");
        assert!(msg.trace.is_empty());
    }

    #[test]
    fn assistant_message_keeps_trace_order() {
        let trace = vec![
            ScratchpadEntry::output("welcome_email_tool", "a@b.com", "sent"),
            ScratchpadEntry::unknown_tool("nope", "x", "no such tool"),
        ];
        let msg = Message::assistant_with_trace("Done!", trace.clone());
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.trace, trace);
    }

    #[test]
    fn empty_trace_is_omitted_from_json() {
        let json = serde_json::to_value(Message::assistant("hi")).expect("serialize");
        assert!(json.get("trace").is_none());
        assert_eq!(json["role"], "assistant");
    }
}
