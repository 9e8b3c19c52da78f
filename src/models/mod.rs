//! Data model shared across the client, store and controller.

mod message;
mod request;
mod session;

pub use message::{Content, FunctionCall, FunctionResponse, Message, Part, Role};
pub use request::{CreateSessionRequest, NewMessage, RunRequest, TextPart};
pub use session::{
    event_timestamp, normalize_update_time, Session, SessionDetail, SessionEvent, SessionSummary,
};
