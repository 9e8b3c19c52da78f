//! Owned session/message state.
//!
//! One `SessionStore` instance holds everything the front end renders:
//! the session list (sorted most-recent first), the messages per session,
//! and any surfaced per-session error. The stream controller is its only
//! writer; there is no ambient global state.

mod history;

pub use history::messages_from_events;

use std::collections::HashMap;

use crate::models::{FunctionCall, FunctionResponse, Message, Session};

/// In-memory store for sessions and their messages.
#[derive(Debug, Default)]
pub struct SessionStore {
    /// Sessions ordered by normalized update time, descending.
    sessions: Vec<Session>,
    /// Messages per session id.
    messages: HashMap<String, Vec<Message>>,
    /// Latest surfaced error per session id.
    errors: HashMap<String, String>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All sessions, most recently updated first.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Look up one session.
    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Whether a session with this id is known.
    pub fn contains_session(&self, id: &str) -> bool {
        self.session(id).is_some()
    }

    /// Replace the session list, e.g. after a refresh from the server.
    ///
    /// Locally-known titles survive a refresh when the server copy carries
    /// none. Cached messages for sessions that disappeared are dropped.
    pub fn set_sessions(&mut self, mut incoming: Vec<Session>) {
        for session in &mut incoming {
            if session.title.is_empty() {
                if let Some(existing) = self.session(&session.id) {
                    session.title = existing.title.clone();
                }
            }
        }
        self.messages
            .retain(|id, _| incoming.iter().any(|s| &s.id == id));
        self.errors
            .retain(|id, _| incoming.iter().any(|s| &s.id == id));
        self.sessions = incoming;
        self.sort_sessions();
    }

    /// Insert or update one session.
    ///
    /// `last_update_time` stays monotonic and an existing title survives an
    /// untitled update.
    pub fn upsert_session(&mut self, session: Session) {
        match self.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => {
                existing.app_name = session.app_name;
                existing.user_id = session.user_id;
                if !session.title.is_empty() {
                    existing.title = session.title;
                }
                if session.last_update_time > existing.last_update_time {
                    existing.last_update_time = session.last_update_time;
                }
            }
            None => self.sessions.push(session),
        }
        self.sort_sessions();
    }

    /// Bump a session's update time. Lower values are ignored.
    pub fn touch_session(&mut self, id: &str, update_time: i64) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
            if update_time > session.last_update_time {
                session.last_update_time = update_time;
            }
        }
        self.sort_sessions();
    }

    /// Give an untitled session a title; titled sessions are left alone.
    pub fn set_title_if_empty(&mut self, id: &str, title: &str) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
            if session.title.is_empty() {
                session.title = title.to_string();
            }
        }
    }

    /// Remove a session and everything cached for it.
    pub fn remove_session(&mut self, id: &str) {
        self.sessions.retain(|s| s.id != id);
        self.messages.remove(id);
        self.errors.remove(id);
    }

    /// Messages of a session, oldest first. Empty for unknown sessions.
    pub fn messages(&self, session_id: &str) -> &[Message] {
        self.messages
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace a session's message list, e.g. from reconstructed history.
    pub fn set_messages(&mut self, session_id: &str, messages: Vec<Message>) {
        self.messages.insert(session_id.to_string(), messages);
    }

    /// Append one message to a session.
    pub fn push_message(&mut self, session_id: &str, message: Message) {
        self.messages
            .entry(session_id.to_string())
            .or_default()
            .push(message);
    }

    /// Mutable access to one message by id.
    pub fn message_mut(&mut self, session_id: &str, message_id: &str) -> Option<&mut Message> {
        self.messages
            .get_mut(session_id)?
            .iter_mut()
            .find(|m| m.id == message_id)
    }

    /// Remove one message. Returns whether anything was removed.
    pub fn remove_message(&mut self, session_id: &str, message_id: &str) -> bool {
        let Some(messages) = self.messages.get_mut(session_id) else {
            return false;
        };
        let before = messages.len();
        messages.retain(|m| m.id != message_id);
        messages.len() != before
    }

    /// Overwrite a message's accumulated content.
    pub fn set_message_content(&mut self, session_id: &str, message_id: &str, content: &str) {
        if let Some(message) = self.message_mut(session_id, message_id) {
            message.content = content.to_string();
        }
    }

    /// Append a function call to a message.
    pub fn append_function_call(
        &mut self,
        session_id: &str,
        message_id: &str,
        call: FunctionCall,
    ) {
        if let Some(message) = self.message_mut(session_id, message_id) {
            message.function_calls.push(call);
        }
    }

    /// Append a function response to a message.
    pub fn append_function_response(
        &mut self,
        session_id: &str,
        message_id: &str,
        response: FunctionResponse,
    ) {
        if let Some(message) = self.message_mut(session_id, message_id) {
            message.function_responses.push(response);
        }
    }

    /// Clear a message's streaming flag, keeping its content.
    pub fn finalize_message(&mut self, session_id: &str, message_id: &str) {
        if let Some(message) = self.message_mut(session_id, message_id) {
            message.finalize();
        }
    }

    /// Surface an error for a session.
    pub fn set_error(&mut self, session_id: &str, error: String) {
        self.errors.insert(session_id.to_string(), error);
    }

    /// The currently surfaced error for a session, if any.
    pub fn error(&self, session_id: &str) -> Option<&str> {
        self.errors.get(session_id).map(String::as_str)
    }

    /// Remove and return the surfaced error for a session.
    pub fn take_error(&mut self, session_id: &str) -> Option<String> {
        self.errors.remove(session_id)
    }

    fn sort_sessions(&mut self) {
        self.sessions
            .sort_by(|a, b| b.last_update_time.cmp(&a.last_update_time));
    }
}
