use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// The agent side. Some backends label this role `assistant`.
    #[serde(alias = "assistant")]
    Model,
}

/// A function call requested by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FunctionCall {
    pub id: Option<String>,
    pub name: String,
    pub args: serde_json::Map<String, serde_json::Value>,
}

/// The result of a function call, echoed back through the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FunctionResponse {
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Map<String, serde_json::Value>,
}

/// One part of an event's content, as sent on the wire.
///
/// A part carries either text (optionally flagged as internal "thought"
/// content), a function call, or a function response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    pub text: Option<String>,
    pub thought: Option<bool>,
    pub function_call: Option<FunctionCall>,
    pub function_response: Option<FunctionResponse>,
}

/// Content block of an event: a role plus its ordered parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Content {
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

/// A message within a session.
///
/// User messages are created complete and never change. Assistant messages
/// start as an empty streaming placeholder and are mutated in place by
/// stream events until the stream ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
    #[serde(default)]
    pub function_responses: Vec<FunctionResponse>,
}

impl Message {
    /// Create a complete user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role: Role::User,
            content: content.into(),
            is_streaming: false,
            function_calls: Vec::new(),
            function_responses: Vec::new(),
        }
    }

    /// Create the empty assistant placeholder inserted when a request is sent.
    pub fn placeholder() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role: Role::Model,
            content: String::new(),
            is_streaming: true,
            function_calls: Vec::new(),
            function_responses: Vec::new(),
        }
    }

    /// Whether any displayable text has arrived.
    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// Mark the message as no longer streaming, keeping whatever content it has.
    pub fn finalize(&mut self) {
        self.is_streaming = false;
    }
}
