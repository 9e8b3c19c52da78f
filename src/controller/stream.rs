//! Message submission and stream processing.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use super::{ActiveStream, ChatController, StreamUpdate};
use crate::client::{AgentClient, EventStream};
use crate::models::{Message, RunRequest};
use crate::sse::reconcile;

/// Maximum length of a session title derived from the first message.
const TITLE_MAX_CHARS: usize = 60;

/// Synchronous rejections of a send attempt. No partial state is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("No session is ready. Create or open a session first.")]
    NotReady,
    #[error("Please wait for the current response to complete before sending another message.")]
    Busy,
    #[error("Nothing to send.")]
    Empty,
}

impl ChatController {
    /// Send one user message on the active session and start streaming the
    /// reply.
    ///
    /// Creates the user message and the assistant placeholder, then spawns
    /// the stream task. Returns the placeholder's message id.
    pub fn send_message(&mut self, text: &str) -> Result<String, SendError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SendError::Empty);
        }
        let Some(session_id) = self.active_session.clone() else {
            return Err(SendError::NotReady);
        };
        if !self.store.contains_session(&session_id) {
            return Err(SendError::NotReady);
        }
        if self.stream.is_some() {
            return Err(SendError::Busy);
        }

        self.store.take_error(&session_id);
        self.store
            .set_title_if_empty(&session_id, &truncate_title(text));
        self.store.push_message(&session_id, Message::user(text));

        let placeholder = Message::placeholder();
        let message_id = placeholder.id.clone();
        self.store.push_message(&session_id, placeholder);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.stream = Some(ActiveStream {
            session_id: session_id.clone(),
            message_id: message_id.clone(),
            cancel: cancel_tx,
            cancel_requested: false,
        });

        let client = Arc::clone(&self.client);
        let request = RunRequest::new(
            client.app_name(),
            client.user_id(),
            session_id.clone(),
            text,
        );
        let tx = self.update_tx.clone();
        let timeout = self.stream_timeout;

        tokio::spawn(run_stream(
            client, request, session_id, message_id.clone(), cancel_rx, tx, timeout,
        ));

        Ok(message_id)
    }
}

/// Drive one streaming turn from request to terminal update.
async fn run_stream(
    client: Arc<AgentClient>,
    request: RunRequest,
    session_id: String,
    message_id: String,
    mut cancel: watch::Receiver<bool>,
    tx: mpsc::UnboundedSender<StreamUpdate>,
    timeout: Option<Duration>,
) {
    // Requesting: awaiting headers is already cancellable.
    let response = tokio::select! {
        biased;

        _ = cancel.changed() => {
            let _ = tx.send(StreamUpdate::Cancelled { session_id, message_id });
            return;
        }
        response = client.run_sse(&request) => response,
    };

    let mut events = match response {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(error = %e, %session_id, "stream request failed");
            let _ = tx.send(StreamUpdate::Failed {
                session_id,
                message_id,
                error: e.to_string(),
            });
            return;
        }
    };

    let _ = tx.send(StreamUpdate::Streaming {
        session_id: session_id.clone(),
        message_id: message_id.clone(),
    });

    match timeout {
        Some(limit) => {
            let bounded = tokio::time::timeout(
                limit,
                process_stream(&mut events, &mut cancel, &tx, &session_id, &message_id),
            );
            if bounded.await.is_err() {
                tracing::error!(%session_id, "stream exceeded the configured timeout");
                let _ = tx.send(StreamUpdate::Failed {
                    session_id,
                    message_id,
                    error: format!("Stream timed out after {}s", limit.as_secs()),
                });
            }
        }
        None => process_stream(&mut events, &mut cancel, &tx, &session_id, &message_id).await,
    }
}

/// Process a stream of parsed events, reconciling text and publishing
/// updates until the stream ends, fails, or is cancelled.
///
/// The accumulated text lives here and nowhere else; it is discarded with
/// the task, so no partial state leaks past a cancel.
pub(crate) async fn process_stream(
    events: &mut EventStream,
    cancel: &mut watch::Receiver<bool>,
    tx: &mpsc::UnboundedSender<StreamUpdate>,
    session_id: &str,
    message_id: &str,
) {
    let mut accumulated = String::new();

    let cancelled = cancel.wait_for(|stop| *stop);
    tokio::pin!(cancelled);

    loop {
        tokio::select! {
            biased;

            // A closed sender means the controller is gone; either way this
            // is a clean stop, never an error.
            _ = &mut cancelled => {
                let _ = tx.send(StreamUpdate::Cancelled {
                    session_id: session_id.to_string(),
                    message_id: message_id.to_string(),
                });
                return;
            }
            item = events.next() => match item {
                Some(Ok(event)) => {
                    if let Some(agent) = event.agent {
                        let _ = tx.send(StreamUpdate::Agent {
                            session_id: session_id.to_string(),
                            agent,
                        });
                    }
                    if !event.text_parts.is_empty() {
                        let next = reconcile(&accumulated, &event.text_parts);
                        if next != accumulated {
                            accumulated = next;
                            let _ = tx.send(StreamUpdate::Content {
                                session_id: session_id.to_string(),
                                message_id: message_id.to_string(),
                                text: accumulated.clone(),
                            });
                        }
                    }
                    if let Some(call) = event.function_call {
                        let _ = tx.send(StreamUpdate::FunctionCall {
                            session_id: session_id.to_string(),
                            message_id: message_id.to_string(),
                            call,
                        });
                    }
                    if let Some(response) = event.function_response {
                        let _ = tx.send(StreamUpdate::FunctionResponse {
                            session_id: session_id.to_string(),
                            message_id: message_id.to_string(),
                            response,
                        });
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, session_id, "stream read failed");
                    let _ = tx.send(StreamUpdate::Failed {
                        session_id: session_id.to_string(),
                        message_id: message_id.to_string(),
                        error: e.to_string(),
                    });
                    return;
                }
                None => {
                    let _ = tx.send(StreamUpdate::Completed {
                        session_id: session_id.to_string(),
                        message_id: message_id.to_string(),
                    });
                    return;
                }
            }
        }
    }
}

/// First line of the text, cut at a char boundary.
fn truncate_title(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() <= TITLE_MAX_CHARS {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(TITLE_MAX_CHARS - 1).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::models::FunctionCall;
    use crate::sse::ParsedEvent;
    use futures_util::stream;

    fn event_stream(items: Vec<Result<ParsedEvent, ClientError>>) -> EventStream {
        Box::pin(stream::iter(items))
    }

    fn text_event(fragments: &[&str]) -> ParsedEvent {
        ParsedEvent {
            text_parts: fragments.iter().map(|s| s.to_string()).collect(),
            ..ParsedEvent::default()
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<StreamUpdate>) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_process_stream_reconciles_superset() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut events = event_stream(vec![
            Ok(ParsedEvent {
                agent: Some("agent1".to_string()),
                ..text_event(&["Hel"])
            }),
            Ok(text_event(&["Hello"])),
        ]);

        process_stream(&mut events, &mut cancel_rx, &tx, "s-1", "m-1").await;

        let updates = drain(&mut rx);
        assert_eq!(
            updates,
            vec![
                StreamUpdate::Agent {
                    session_id: "s-1".to_string(),
                    agent: "agent1".to_string(),
                },
                StreamUpdate::Content {
                    session_id: "s-1".to_string(),
                    message_id: "m-1".to_string(),
                    text: "Hel".to_string(),
                },
                StreamUpdate::Content {
                    session_id: "s-1".to_string(),
                    message_id: "m-1".to_string(),
                    text: "Hello".to_string(),
                },
                StreamUpdate::Completed {
                    session_id: "s-1".to_string(),
                    message_id: "m-1".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_process_stream_suppresses_duplicates() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut events = event_stream(vec![
            Ok(text_event(&["Hello"])),
            Ok(text_event(&["Hello"])),
        ]);

        process_stream(&mut events, &mut cancel_rx, &tx, "s-1", "m-1").await;

        let content_updates: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|u| matches!(u, StreamUpdate::Content { .. }))
            .collect();
        assert_eq!(content_updates.len(), 1);
    }

    #[tokio::test]
    async fn test_process_stream_empty_events_publish_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        // A malformed frame interprets to an empty event
        let mut events = event_stream(vec![
            Ok(text_event(&["Hi"])),
            Ok(ParsedEvent::default()),
            Ok(text_event(&["Hi there"])),
        ]);

        process_stream(&mut events, &mut cancel_rx, &tx, "s-1", "m-1").await;

        let updates = drain(&mut rx);
        let contents: Vec<_> = updates
            .iter()
            .filter(|u| matches!(u, StreamUpdate::Content { .. }))
            .collect();
        assert_eq!(contents.len(), 2);
        assert!(matches!(
            updates.last(),
            Some(StreamUpdate::Completed { .. })
        ));
    }

    #[tokio::test]
    async fn test_process_stream_function_call_and_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut events = event_stream(vec![Ok(ParsedEvent {
            function_call: Some(FunctionCall {
                name: "get_weather".to_string(),
                ..FunctionCall::default()
            }),
            ..ParsedEvent::default()
        })]);

        process_stream(&mut events, &mut cancel_rx, &tx, "s-1", "m-1").await;

        let updates = drain(&mut rx);
        assert!(matches!(
            updates[0],
            StreamUpdate::FunctionCall { ref call, .. } if call.name == "get_weather"
        ));
    }

    #[tokio::test]
    async fn test_process_stream_error_item_fails() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_cancel_tx, mut cancel_rx) = watch::channel(false);
        let mut events = event_stream(vec![
            Ok(text_event(&["partial"])),
            Err(ClientError::Server {
                status: 502,
                message: "bad gateway".to_string(),
            }),
        ]);

        process_stream(&mut events, &mut cancel_rx, &tx, "s-1", "m-1").await;

        let updates = drain(&mut rx);
        assert!(matches!(
            updates.last(),
            Some(StreamUpdate::Failed { error, .. }) if error.contains("502")
        ));
    }

    #[tokio::test]
    async fn test_process_stream_cancel_wins_over_pending_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        cancel_tx.send(true).ok();

        let mut events = event_stream(vec![Ok(text_event(&["never seen"]))]);
        process_stream(&mut events, &mut cancel_rx, &tx, "s-1", "m-1").await;

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 1);
        assert!(matches!(updates[0], StreamUpdate::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_send_message_guards() {
        use crate::config::Config;

        let config = Config::default().with_base_url("http://127.0.0.1:1");
        let client = Arc::new(AgentClient::new(&config));
        let (mut controller, _rx) = ChatController::new(client, &config);

        assert_eq!(controller.send_message("hi"), Err(SendError::NotReady));
        assert_eq!(controller.send_message("   "), Err(SendError::Empty));

        controller
            .store_mut()
            .upsert_session(crate::models::Session {
                id: "s-1".to_string(),
                app_name: "sample_agent".to_string(),
                user_id: "u-1".to_string(),
                last_update_time: 1,
                title: String::new(),
            });
        controller.active_session = Some("s-1".to_string());

        let first = controller.send_message("hello");
        assert!(first.is_ok());
        assert!(controller.is_streaming());

        // Reentrant send while the first is in flight is rejected, not queued
        assert_eq!(controller.send_message("again"), Err(SendError::Busy));

        // The rejected send created no partial state: one user message plus
        // one placeholder from the accepted send
        assert_eq!(controller.store().messages("s-1").len(), 2);
    }

    #[tokio::test]
    async fn test_send_message_sets_title_and_placeholder() {
        use crate::config::Config;
        use crate::models::Role;

        let config = Config::default().with_base_url("http://127.0.0.1:1");
        let client = Arc::new(AgentClient::new(&config));
        let (mut controller, _rx) = ChatController::new(client, &config);
        controller
            .store_mut()
            .upsert_session(crate::models::Session {
                id: "s-1".to_string(),
                app_name: "sample_agent".to_string(),
                user_id: "u-1".to_string(),
                last_update_time: 1,
                title: String::new(),
            });
        controller.active_session = Some("s-1".to_string());

        let message_id = controller.send_message("what's the weather?").unwrap();

        let messages = controller.store().messages("s-1");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "what's the weather?");
        assert_eq!(messages[1].id, message_id);
        assert_eq!(messages[1].role, Role::Model);
        assert!(messages[1].is_streaming);
        assert_eq!(
            controller.store().session("s-1").unwrap().title,
            "what's the weather?"
        );
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("short"), "short");
        assert_eq!(truncate_title("first\nsecond"), "first");
        let long = "x".repeat(100);
        let title = truncate_title(&long);
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS);
        assert!(title.ends_with('…'));
    }
}
