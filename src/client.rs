//! HTTP client for the agent service.
//!
//! Provides the REST calls for session lifecycle and the streaming run
//! endpoint, whose response body is decoded through the `sse` pipeline into
//! a stream of [`ParsedEvent`]s.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use futures_util::StreamExt;
use reqwest::Client;

use crate::config::Config;
use crate::models::{
    CreateSessionRequest, RunRequest, Session, SessionDetail, SessionSummary,
};
use crate::sse::{interpret, EventAssembler, LineFramer, ParsedEvent};

/// Error type for agent service operations.
#[derive(Debug)]
pub enum ClientError {
    /// HTTP request failed (connection, timeout, body read, decode)
    Http(reqwest::Error),
    /// Server returned an error status
    Server { status: u16, message: String },
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Http(e) => write!(f, "HTTP error: {}", e),
            ClientError::Server { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Http(e) => Some(e),
            ClientError::Server { .. } => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Http(e)
    }
}

/// A stream of parsed events decoded from a streaming run response.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ParsedEvent, ClientError>> + Send>>;

/// Client for the agent service API.
///
/// Holds the base URL plus the app/user scope every session endpoint is
/// keyed by, and a reusable HTTP client.
pub struct AgentClient {
    base_url: String,
    app_name: String,
    user_id: String,
    request_timeout: Duration,
    http: Client,
}

impl AgentClient {
    /// Create a client from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_name: config.app_name.clone(),
            user_id: config.user_id.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            http: Client::new(),
        }
    }

    /// The app this client is scoped to.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// The user this client is scoped to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/apps/{}/users/{}/sessions",
            self.base_url, self.app_name, self.user_id
        )
    }

    /// Create a session with a client-chosen id.
    pub async fn create_session(&self, session_id: &str) -> Result<Session, ClientError> {
        let body = CreateSessionRequest::new(session_id);
        let response = self
            .http
            .post(self.sessions_url())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let summary: SessionSummary = response.json().await?;
        Ok(Session::from_summary(summary))
    }

    /// Fetch one session with its event history.
    ///
    /// Returns `Ok(None)` on 404: a missing session is a state reset for the
    /// caller, not a failure.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionDetail>, ClientError> {
        let response = self
            .http
            .get(format!("{}/{}", self.sessions_url(), session_id))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        Ok(Some(response.json().await?))
    }

    /// List session summaries, normalized and sorted most-recent first.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, ClientError> {
        let response = self
            .http
            .get(self.sessions_url())
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let summaries: Vec<SessionSummary> = response.json().await?;
        let mut sessions: Vec<Session> =
            summaries.into_iter().map(Session::from_summary).collect();
        sessions.sort_by(|a, b| b.last_update_time.cmp(&a.last_update_time));
        Ok(sessions)
    }

    /// Delete a session. A 404 counts as success.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(format!("{}/{}", self.sessions_url(), session_id))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(server_error(response).await);
        }
        Ok(())
    }

    /// Start a streaming run and return its decoded event stream.
    ///
    /// The response body is driven through the framer, assembler and
    /// interpreter as chunks arrive; no per-request timeout is applied here
    /// since the stream stays open for the whole turn.
    pub async fn run_sse(&self, request: &RunRequest) -> Result<EventStream, ClientError> {
        let url = format!("{}/run_sse", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }

        let bytes_stream = Box::pin(response.bytes_stream());

        let event_stream = stream::unfold(
            (
                bytes_stream,
                LineFramer::new(),
                EventAssembler::new(),
                VecDeque::new(),
                false,
            ),
            |(mut bytes_stream, mut framer, mut assembler, mut pending, mut done)| async move {
                loop {
                    if let Some(event) = pending.pop_front() {
                        return Some((
                            Ok(event),
                            (bytes_stream, framer, assembler, pending, done),
                        ));
                    }
                    if done {
                        return None;
                    }

                    match bytes_stream.next().await {
                        Some(Ok(chunk)) => {
                            for line in framer.feed(&chunk) {
                                if let Some(payload) = assembler.feed_line(&line) {
                                    pending.push_back(interpret(&payload));
                                }
                            }
                        }
                        Some(Err(e)) => {
                            done = true;
                            return Some((
                                Err(ClientError::Http(e)),
                                (bytes_stream, framer, assembler, pending, done),
                            ));
                        }
                        None => {
                            // Stream ended; the last event may lack both its
                            // newline and its blank-line terminator.
                            done = true;
                            if let Some(rest) = framer.flush() {
                                if let Some(payload) = assembler.feed_line(&rest) {
                                    pending.push_back(interpret(&payload));
                                }
                            }
                            if let Some(payload) = assembler.finish() {
                                pending.push_back(interpret(&payload));
                            }
                        }
                    }
                }
            },
        );

        Ok(Box::pin(event_stream))
    }
}

/// Turn a non-2xx response into a `ClientError`, carrying the body text.
async fn server_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ClientError::Server { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> Config {
        Config::default()
            .with_base_url(base_url)
            .with_app_name("sample_agent")
            .with_user_id("u-1")
    }

    #[test]
    fn test_client_urls() {
        let client = AgentClient::new(&test_config("http://localhost:8000/"));
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.sessions_url(),
            "http://localhost:8000/apps/sample_agent/users/u-1/sessions"
        );
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Server {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("500"));
        assert!(display.contains("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_create_session_with_unreachable_server() {
        let client = AgentClient::new(&test_config("http://127.0.0.1:1"));
        let result = client.create_session("s-1").await;
        assert!(matches!(result, Err(ClientError::Http(_))));
    }

    #[tokio::test]
    async fn test_run_sse_with_unreachable_server() {
        let client = AgentClient::new(&test_config("http://127.0.0.1:1"));
        let request = RunRequest::new("sample_agent", "u-1", "s-1", "hi");
        let result = client.run_sse(&request).await;
        assert!(result.is_err());
    }
}
