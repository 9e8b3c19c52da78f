//! Byte-chunk to line framing for SSE response bodies.
//!
//! Network reads deliver arbitrary chunk boundaries: a line, a JSON object,
//! or even a single UTF-8 code point may span two reads. The framer buffers
//! raw bytes and only yields complete `\n`-terminated lines, so everything
//! downstream can work line-at-a-time.

/// Stateful line framer over raw byte chunks.
///
/// Splits strictly on `\n` and retains any bytes after the last newline
/// (including a partially-received multi-byte code point) until the next
/// `feed` or a final `flush`. Carriage returns are not stripped here;
/// downstream consumers tolerate a trailing `\r`.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    /// Create a new framer with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, returning every complete line it unlocked.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            lines.push(String::from_utf8_lossy(&self.buf[start..end]).into_owned());
            start = end + 1;
        }
        if start > 0 {
            self.buf.drain(..start);
        }
        lines
    }

    /// Drain the final unterminated fragment at end-of-stream, if any.
    ///
    /// The fragment is treated as a line with no terminator; the buffer is
    /// left empty either way.
    pub fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        Some(rest)
    }

    /// Whether any partial line is currently buffered.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}
