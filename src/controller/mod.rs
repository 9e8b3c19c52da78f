//! The stream session controller.
//!
//! `ChatController` owns the session/message store and at most one in-flight
//! streaming request. Sending a message spawns a task that drives the SSE
//! pipeline and publishes [`StreamUpdate`]s; the owning loop hands each one
//! back to [`ChatController::apply_update`], which is the only place store
//! mutation happens. The single-flight handle doubles as the source of truth
//! for "is a request outstanding".

mod cancel;
mod stream;
mod updates;

pub use stream::SendError;
pub use updates::StreamUpdate;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};

use crate::client::{AgentClient, ClientError};
use crate::config::Config;
use crate::models::Session;
use crate::store::{messages_from_events, SessionStore};

/// Handle to the one in-flight streaming request.
#[derive(Debug)]
pub(crate) struct ActiveStream {
    pub(crate) session_id: String,
    pub(crate) message_id: String,
    pub(crate) cancel: watch::Sender<bool>,
    pub(crate) cancel_requested: bool,
}

/// Controller driving one conversation at a time against the agent service.
pub struct ChatController {
    pub(crate) client: Arc<AgentClient>,
    pub(crate) store: SessionStore,
    pub(crate) active_session: Option<String>,
    pub(crate) update_tx: mpsc::UnboundedSender<StreamUpdate>,
    pub(crate) stream: Option<ActiveStream>,
    pub(crate) current_agent: Option<String>,
    pub(crate) processing_function: bool,
    pub(crate) stream_timeout: Option<Duration>,
}

impl ChatController {
    /// Create a controller and the receiver its stream tasks publish to.
    pub fn new(
        client: Arc<AgentClient>,
        config: &Config,
    ) -> (Self, mpsc::UnboundedReceiver<StreamUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let controller = Self {
            client,
            store: SessionStore::new(),
            active_session: None,
            update_tx,
            stream: None,
            current_agent: None,
            processing_function: false,
            stream_timeout: config.stream_timeout_secs.map(Duration::from_secs),
        };
        (controller, update_rx)
    }

    /// Read access to the store for rendering.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Write access to the store, e.g. for seeding from local persistence.
    pub fn store_mut(&mut self) -> &mut SessionStore {
        &mut self.store
    }

    /// The session sends are currently directed at.
    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    /// Whether a streaming request is outstanding.
    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }

    /// Name of the agent currently responding, while a stream is live.
    pub fn current_agent(&self) -> Option<&str> {
        self.current_agent.as_deref()
    }

    /// Whether the agent is between a function call and its response.
    pub fn is_processing_function(&self) -> bool {
        self.processing_function
    }

    /// Create a fresh session on the server and make it active.
    pub async fn new_session(&mut self) -> Result<String, ClientError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let session = self.client.create_session(&session_id).await?;
        let id = session.id.clone();
        self.store.upsert_session(session);
        self.active_session = Some(id.clone());
        self.store.set_messages(&id, Vec::new());
        Ok(id)
    }

    /// Fetch a session's history and make it active.
    ///
    /// Returns `Ok(false)` when the server no longer knows the session; the
    /// local copy is dropped and the active session reset, but this is not
    /// an error.
    pub async fn open_session(&mut self, session_id: &str) -> Result<bool, ClientError> {
        match self.client.get_session(session_id).await? {
            Some(detail) => {
                let messages = messages_from_events(&detail.events);
                self.store.upsert_session(Session {
                    id: detail.id.clone(),
                    app_name: self.client.app_name().to_string(),
                    user_id: self.client.user_id().to_string(),
                    last_update_time: crate::models::normalize_update_time(
                        detail.last_update_time,
                    ),
                    title: String::new(),
                });
                self.store.set_messages(&detail.id, messages);
                self.active_session = Some(detail.id);
                Ok(true)
            }
            None => {
                tracing::info!(session_id, "session no longer exists, resetting");
                self.store.remove_session(session_id);
                if self.active_session.as_deref() == Some(session_id) {
                    self.active_session = None;
                }
                Ok(false)
            }
        }
    }

    /// Replace the session list from the server.
    pub async fn refresh_sessions(&mut self) -> Result<usize, ClientError> {
        let sessions = self.client.list_sessions().await?;
        let count = sessions.len();
        self.store.set_sessions(sessions);
        if let Some(active) = &self.active_session {
            if !self.store.contains_session(active) {
                self.active_session = None;
            }
        }
        Ok(count)
    }

    /// Delete a session on the server and locally.
    ///
    /// An in-flight stream on that session is cancelled first.
    pub async fn delete_session(&mut self, session_id: &str) -> Result<(), ClientError> {
        if self
            .stream
            .as_ref()
            .is_some_and(|s| s.session_id == session_id)
        {
            self.cancel_active_stream();
        }
        self.client.delete_session(session_id).await?;
        self.store.remove_session(session_id);
        if self.active_session.as_deref() == Some(session_id) {
            self.active_session = None;
        }
        Ok(())
    }

    /// Fold one stream update into the store and controller state.
    pub fn apply_update(&mut self, update: StreamUpdate) {
        match update {
            StreamUpdate::Streaming { .. } => {
                // Placeholder already exists; transition marker for the
                // front end only.
            }
            StreamUpdate::Content {
                session_id,
                message_id,
                text,
            } => {
                self.store
                    .set_message_content(&session_id, &message_id, &text);
            }
            StreamUpdate::FunctionCall {
                session_id,
                message_id,
                call,
            } => {
                self.store
                    .append_function_call(&session_id, &message_id, call);
                self.processing_function = true;
            }
            StreamUpdate::FunctionResponse {
                session_id,
                message_id,
                response,
            } => {
                self.store
                    .append_function_response(&session_id, &message_id, response);
                self.processing_function = false;
            }
            StreamUpdate::Agent { agent, .. } => {
                self.current_agent = Some(agent);
            }
            StreamUpdate::Completed {
                session_id,
                message_id,
            } => {
                self.store.finalize_message(&session_id, &message_id);
                self.store
                    .touch_session(&session_id, Utc::now().timestamp());
                self.finish_stream(&session_id);
            }
            StreamUpdate::Cancelled {
                session_id,
                message_id,
            } => {
                // Partial content is kept; cancellation is a clean stop.
                self.store.finalize_message(&session_id, &message_id);
                self.finish_stream(&session_id);
            }
            StreamUpdate::Failed {
                session_id,
                message_id,
                error,
            } => {
                self.store.remove_message(&session_id, &message_id);
                self.store.set_error(&session_id, error);
                self.finish_stream(&session_id);
            }
        }
    }

    fn finish_stream(&mut self, session_id: &str) {
        if self
            .stream
            .as_ref()
            .is_some_and(|s| s.session_id == session_id)
        {
            self.stream = None;
        }
        self.current_agent = None;
        self.processing_function = false;
    }
}
