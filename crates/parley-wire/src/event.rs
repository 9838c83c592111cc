//! Wire events and request bodies for the streaming chat endpoint

use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted by the streaming chat endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// Incremental text fragment
    Delta { content: String },
    /// Stream completed successfully
    Done {
        /// Pre-parsed records, when the server did the parsing itself.
        /// The persona-chat endpoint calls these `widgets`, the review
        /// endpoint calls them `comments`.
        #[serde(
            default,
            alias = "widgets",
            alias = "comments",
            skip_serializing_if = "Option::is_none"
        )]
        records: Option<Vec<serde_json::Value>>,
        /// Full raw text of the response, when the server echoes it back
        #[serde(
            default,
            rename = "fullContent",
            alias = "full_content",
            skip_serializing_if = "Option::is_none"
        )]
        full_content: Option<String>,
    },
    /// Server-side failure
    Error { error: String },
}

impl WireEvent {
    /// Check if this is a terminal event (Done or Error)
    pub fn is_terminal(&self) -> bool {
        matches!(self, WireEvent::Done { .. } | WireEvent::Error { .. })
    }
}

/// A stream of wire events
pub type WireEventStream = Pin<Box<dyn Stream<Item = WireEvent> + Send>>;

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn in the request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Persona configuration conditioning the response style of one
/// negotiating party. Free-form strings, passed through opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub role: String,
    pub goal: String,
    pub tone: String,
}

/// Request body for one streaming turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_config: Option<Persona>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub stream: bool,
}
