//! Chat lines as they travel over the wire and into the history log.

use super::connection::DisplayName;

/// Maximum payload read per chunk.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Maximum size of a relayed line including its `[<name>] ` prefix and newline.
pub const DEFAULT_MAX_LINE_LEN: usize = DEFAULT_READ_BUFFER_SIZE + 80;

pub const SHUTDOWN_NOTICE: &str = "Server is shutting down.";
pub const SERVER_FULL_NOTICE: &str = "Server full.";

/// One line of chat, always terminated by exactly one `\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine(Vec<u8>);

impl ChatLine {
    /// `[<name>] joined`
    pub fn joined(name: &DisplayName) -> Self {
        Self::terminated(format!("[{name}] joined").into_bytes())
    }

    /// `[<name>] left`
    pub fn left(name: &DisplayName) -> Self {
        Self::terminated(format!("[{name}] left").into_bytes())
    }

    /// System notice with no name prefix.
    pub fn notice(text: &str) -> Self {
        Self::terminated(text.as_bytes().to_vec())
    }

    /// `[<name>] <payload>`
    ///
    /// Trailing `\r`/`\n` bytes of the payload are dropped and exactly one
    /// `\n` is appended. The payload is cut so that the whole line, newline
    /// included, fits in `max_len` bytes. Payload bytes are copied as-is;
    /// they need not be valid UTF-8.
    pub fn relay(name: &DisplayName, payload: &[u8], max_len: usize) -> Self {
        let mut line = format!("[{name}] ").into_bytes();

        let body = trim_line_end(payload);
        let room = max_len.saturating_sub(line.len() + 1);
        line.extend_from_slice(&body[..body.len().min(room)]);

        Self::terminated(line)
    }

    fn terminated(mut bytes: Vec<u8>) -> Self {
        bytes.push(b'\n');
        Self(bytes)
    }

    /// Wire form, newline included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The same bytes without the terminating newline, for the history log.
    pub fn as_log_bytes(&self) -> &[u8] {
        self.0.strip_suffix(b"\n").unwrap_or(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn trim_line_end(payload: &[u8]) -> &[u8] {
    let end = payload
        .iter()
        .rposition(|b| *b != b'\n' && *b != b'\r')
        .map_or(0, |i| i + 1);
    &payload[..end]
}
