//! UI-agnostic conversation types
//!
//! These are shared by every surface (the TUI, the one-shot CLI) and by the
//! wire layer. Nothing here depends on a UI framework.

use serde::{Deserialize, Serialize};

/// Opening line of every conversation.
pub const GREETING: &str = "Hello! I'm the Changi Airport Assistant. How can I assist you today?";

/// The role of a message sender.
///
/// On the wire the assistant is called `"AI"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    #[serde(rename = "AI")]
    Assistant,
}

impl Role {
    /// Display label, the same as the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "AI",
        }
    }
}

/// A single transcript entry.
///
/// Messages are frozen at creation: the timestamp label is computed once and
/// there are no setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
    timestamp: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn user(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(Role::User, content, timestamp)
    }

    pub fn assistant(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, timestamp)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// The `(role, content)` pair sent to the answering service.
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// One prior turn as the answering service sees it. Timestamps stay local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

/// Request body for `POST <endpoint>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub history: Vec<HistoryEntry>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>, prior: &[Message]) -> Self {
        Self {
            query: query.into(),
            history: prior.iter().map(Message::to_history_entry).collect(),
        }
    }
}
