//! Interpretation of one assembled event payload.
//!
//! A payload is expected to be a single JSON object in the agent server's
//! event shape. A malformed frame must never kill the stream: parse failures
//! are logged and reported as an empty event.

use serde::Deserialize;

use crate::models::{Content, FunctionCall, FunctionResponse};

/// The classified contents of one stream event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedEvent {
    /// Upstream's id for this frame, when present.
    pub message_id: Option<String>,
    /// Displayable text fragments, in order.
    pub text_parts: Vec<String>,
    /// Internal "thinking" fragments, never shown as main content.
    pub thought_parts: Vec<String>,
    /// Name of the agent currently responding.
    pub agent: Option<String>,
    /// At most one function call per event.
    pub function_call: Option<FunctionCall>,
    /// At most one function response per event.
    pub function_response: Option<FunctionResponse>,
}

impl ParsedEvent {
    /// Whether the event carries nothing actionable.
    pub fn is_empty(&self) -> bool {
        self.message_id.is_none()
            && self.text_parts.is_empty()
            && self.thought_parts.is_empty()
            && self.agent.is_none()
            && self.function_call.is_none()
            && self.function_response.is_none()
    }
}

/// Raw wire shape of a stream event.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEvent {
    content: Option<Content>,
    author: Option<String>,
    id: Option<String>,
}

/// Parse one event payload into a [`ParsedEvent`].
///
/// On JSON failure the frame is skipped: the error goes to the log and an
/// empty event is returned, so one bad frame cannot abort the stream.
pub fn interpret(payload: &str) -> ParsedEvent {
    let raw: RawEvent = match serde_json::from_str(payload) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed stream frame");
            return ParsedEvent::default();
        }
    };

    let mut event = ParsedEvent {
        message_id: raw.id.filter(|id| !id.is_empty()),
        agent: raw.author.filter(|a| !a.is_empty()),
        ..ParsedEvent::default()
    };

    let Some(content) = raw.content else {
        return event;
    };

    for part in content.parts {
        if let Some(text) = part.text {
            if part.thought.unwrap_or(false) {
                event.thought_parts.push(text);
            } else {
                event.text_parts.push(text);
            }
        }
        // One call/response per event; if the server ever sends more,
        // the last one wins.
        if let Some(call) = part.function_call {
            event.function_call = Some(call);
        }
        if let Some(response) = part.function_response {
            event.function_response = Some(response);
        }
    }

    event
}
