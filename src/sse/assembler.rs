//! SSE event assembly from framed lines.
//!
//! The upstream stream has no message-boundary-safe framing beyond blank
//! lines: an event is zero or more `data:` lines followed by an empty line.
//! The assembler accumulates `data:` payloads and emits one complete payload
//! string per dispatch.

/// Stateful assembler that folds lines into complete event payloads.
///
/// Classification per line:
/// - blank (empty after trim): dispatch the accumulated payload, if any
/// - `data:` prefix: strip the prefix and a single leading space, accumulate
/// - `:` prefix: comment / keep-alive, ignored
/// - anything else: ignored, unknown fields must not break the stream
#[derive(Debug, Default)]
pub struct EventAssembler {
    payload: String,
}

impl EventAssembler {
    /// Create a new assembler with an empty payload buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line, returning a complete event payload when dispatched.
    pub fn feed_line(&mut self, line: &str) -> Option<String> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim().is_empty() {
            return self.dispatch();
        }

        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            self.payload.push_str(rest);
            self.payload.push('\n');
            return None;
        }

        // Comments and unknown fields are skipped without error
        None
    }

    /// Dispatch any leftover payload at end-of-stream.
    ///
    /// The upstream may not terminate the last event with a blank line.
    pub fn finish(&mut self) -> Option<String> {
        self.dispatch()
    }

    /// Discard any accumulated state.
    pub fn reset(&mut self) {
        self.payload.clear();
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.payload.is_empty() {
            return None;
        }
        let mut payload = std::mem::take(&mut self.payload);
        // Accumulation appends one newline per data line; the final one is
        // not part of the payload.
        if payload.ends_with('\n') {
            payload.pop();
        }
        Some(payload)
    }
}
