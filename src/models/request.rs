use serde::{Deserialize, Serialize};

/// Request body for the streaming run endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    pub streaming: bool,
}

impl RunRequest {
    /// Build a streaming run request for one user turn.
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            new_message: NewMessage::user_text(text),
            streaming: true,
        }
    }
}

/// The user turn carried by a run request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<TextPart>,
}

impl NewMessage {
    /// A single-part user message.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![TextPart { text: text.into() }],
        }
    }
}

/// A plain text part of an outgoing message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextPart {
    pub text: String,
}

/// Request body for session creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub session_id: String,
    pub state: serde_json::Value,
    pub events: Vec<serde_json::Value>,
}

impl CreateSessionRequest {
    /// Create a request for a fresh session with empty state and history.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: serde_json::json!({}),
            events: Vec::new(),
        }
    }
}
