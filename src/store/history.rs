//! Message reconstruction from recorded session events.
//!
//! The server stores one event per turn fragment; the client renders
//! messages. Consecutive events with the same role merge into one message,
//! with one exception: a function-response-only event right after an
//! assistant message always merges into that message, whatever role the
//! server recorded for it.

use uuid::Uuid;

use crate::models::{event_timestamp, Message, Role, SessionEvent};

/// Group a session's event history into renderable messages.
pub fn messages_from_events(events: &[SessionEvent]) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::new();

    for event in events {
        let role = event_role(event);

        let mut text = String::new();
        let mut calls = Vec::new();
        let mut responses = Vec::new();
        if let Some(content) = &event.content {
            for part in &content.parts {
                if let Some(t) = &part.text {
                    if !part.thought.unwrap_or(false) {
                        text.push_str(t);
                    }
                }
                if let Some(call) = &part.function_call {
                    calls.push(call.clone());
                }
                if let Some(response) = &part.function_response {
                    responses.push(response.clone());
                }
            }
        }

        if text.is_empty() && calls.is_empty() && responses.is_empty() {
            continue;
        }

        let response_only = text.is_empty() && calls.is_empty() && !responses.is_empty();

        if let Some(last) = out.last_mut() {
            let merge_into_assistant = response_only && last.role == Role::Model;
            if merge_into_assistant || last.role == role {
                last.content.push_str(&text);
                last.function_calls.extend(calls);
                last.function_responses.extend(responses);
                continue;
            }
        }

        out.push(Message {
            id: if event.id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                event.id.clone()
            },
            timestamp: event_timestamp(event.timestamp),
            role,
            content: text,
            is_streaming: false,
            function_calls: calls,
            function_responses: responses,
        });
    }

    out
}

fn event_role(event: &SessionEvent) -> Role {
    if let Some(role) = event.content.as_ref().and_then(|c| c.role.as_deref()) {
        return if role == "user" { Role::User } else { Role::Model };
    }
    if event.author == "user" {
        Role::User
    } else {
        Role::Model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Content, FunctionCall, FunctionResponse, Part};

    fn text_event(id: &str, role: &str, text: &str) -> SessionEvent {
        SessionEvent {
            id: id.to_string(),
            author: if role == "user" { "user" } else { "agent1" }.to_string(),
            timestamp: Some(1_741_746_967.0),
            content: Some(Content {
                role: Some(role.to_string()),
                parts: vec![Part {
                    text: Some(text.to_string()),
                    ..Part::default()
                }],
            }),
        }
    }

    fn call_event(id: &str, name: &str) -> SessionEvent {
        SessionEvent {
            id: id.to_string(),
            author: "agent1".to_string(),
            timestamp: Some(1_741_746_968.0),
            content: Some(Content {
                role: Some("model".to_string()),
                parts: vec![Part {
                    function_call: Some(FunctionCall {
                        name: name.to_string(),
                        ..FunctionCall::default()
                    }),
                    ..Part::default()
                }],
            }),
        }
    }

    fn response_event(id: &str, role: &str, name: &str) -> SessionEvent {
        SessionEvent {
            id: id.to_string(),
            author: if role == "user" { "user" } else { "agent1" }.to_string(),
            timestamp: Some(1_741_746_969.0),
            content: Some(Content {
                role: Some(role.to_string()),
                parts: vec![Part {
                    function_response: Some(FunctionResponse {
                        name: name.to_string(),
                        ..FunctionResponse::default()
                    }),
                    ..Part::default()
                }],
            }),
        }
    }

    #[test]
    fn test_alternating_roles_stay_separate() {
        let events = vec![
            text_event("e1", "user", "hi"),
            text_event("e2", "model", "hello"),
            text_event("e3", "user", "how are you?"),
        ];
        let messages = messages_from_events(&events);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[2].role, Role::User);
    }

    #[test]
    fn test_consecutive_same_role_merged() {
        let events = vec![
            text_event("e1", "user", "hi"),
            text_event("e2", "model", "Let me "),
            text_event("e3", "model", "check that."),
        ];
        let messages = messages_from_events(&events);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Let me check that.");
        assert_eq!(messages[1].id, "e2");
    }

    #[test]
    fn test_function_response_only_merges_into_assistant_despite_role() {
        // The server records the tool result under the user role; it still
        // belongs to the assistant message that triggered it.
        let events = vec![
            text_event("e1", "user", "weather in Singapore?"),
            call_event("e2", "get_weather"),
            response_event("e3", "user", "get_weather"),
            text_event("e4", "model", "It is cloudy."),
        ];
        let messages = messages_from_events(&events);
        // The response folds into the assistant message even though the
        // server recorded it under the user role, and the follow-up model
        // text continues that same message.
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].function_calls.len(), 1);
        assert_eq!(messages[1].function_responses.len(), 1);
        assert_eq!(messages[1].content, "It is cloudy.");
    }

    #[test]
    fn test_two_consecutive_function_calls_accumulate() {
        let events = vec![
            text_event("e1", "user", "weather and time?"),
            call_event("e2", "get_weather"),
            call_event("e3", "get_current_time"),
        ];
        let messages = messages_from_events(&events);
        assert_eq!(messages.len(), 2);
        let names: Vec<&str> = messages[1]
            .function_calls
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["get_weather", "get_current_time"]);
    }

    #[test]
    fn test_empty_events_skipped() {
        let events = vec![
            SessionEvent::default(),
            text_event("e1", "user", "hi"),
            SessionEvent {
                id: "e2".to_string(),
                author: "agent1".to_string(),
                timestamp: None,
                content: Some(Content::default()),
            },
        ];
        let messages = messages_from_events(&events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi");
    }

    #[test]
    fn test_thought_text_excluded_from_content() {
        let mut event = text_event("e1", "model", "visible");
        event.content.as_mut().unwrap().parts.insert(
            0,
            Part {
                text: Some("hidden plan".to_string()),
                thought: Some(true),
                ..Part::default()
            },
        );
        let messages = messages_from_events(&[event]);
        assert_eq!(messages[0].content, "visible");
    }

    #[test]
    fn test_role_falls_back_to_author() {
        let event = SessionEvent {
            id: "e1".to_string(),
            author: "agent1".to_string(),
            timestamp: None,
            content: Some(Content {
                role: None,
                parts: vec![Part {
                    text: Some("hello".to_string()),
                    ..Part::default()
                }],
            }),
        };
        let messages = messages_from_events(&[event]);
        assert_eq!(messages[0].role, Role::Model);
    }

    #[test]
    fn test_event_without_id_gets_generated_one() {
        let mut event = text_event("", "user", "hi");
        event.id.clear();
        let messages = messages_from_events(&[event]);
        assert!(!messages[0].id.is_empty());
    }
}
