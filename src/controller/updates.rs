//! Updates emitted by an in-flight stream task.
//!
//! The spawned stream task cannot touch the store directly; it publishes
//! these updates over an unbounded channel and the owning loop folds them
//! in via [`ChatController::apply_update`](super::ChatController::apply_update).

use crate::models::{FunctionCall, FunctionResponse};

/// One state change produced while processing a streaming turn.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// The response headers arrived and the body is being read.
    Streaming {
        session_id: String,
        message_id: String,
    },
    /// The reconciled text changed; `text` is the full accumulated content.
    Content {
        session_id: String,
        message_id: String,
        text: String,
    },
    /// The agent requested a function call.
    FunctionCall {
        session_id: String,
        message_id: String,
        call: FunctionCall,
    },
    /// A function result came back through the stream.
    FunctionResponse {
        session_id: String,
        message_id: String,
        response: FunctionResponse,
    },
    /// The responding agent identified itself.
    Agent { session_id: String, agent: String },
    /// The stream ended normally.
    Completed {
        session_id: String,
        message_id: String,
    },
    /// The stream was cancelled by the user; partial content is kept.
    Cancelled {
        session_id: String,
        message_id: String,
    },
    /// The stream failed; the placeholder message is removed.
    Failed {
        session_id: String,
        message_id: String,
        error: String,
    },
}

impl StreamUpdate {
    /// The session this update belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            StreamUpdate::Streaming { session_id, .. }
            | StreamUpdate::Content { session_id, .. }
            | StreamUpdate::FunctionCall { session_id, .. }
            | StreamUpdate::FunctionResponse { session_id, .. }
            | StreamUpdate::Agent { session_id, .. }
            | StreamUpdate::Completed { session_id, .. }
            | StreamUpdate::Cancelled { session_id, .. }
            | StreamUpdate::Failed { session_id, .. } => session_id,
        }
    }

    /// Whether this update ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamUpdate::Completed { .. }
                | StreamUpdate::Cancelled { .. }
                | StreamUpdate::Failed { .. }
        )
    }
}
