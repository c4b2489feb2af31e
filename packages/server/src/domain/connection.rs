//! Connection handle: the server-side object for one live connection.
//!
//! A handle bundles the connection's identity, its display name and the write
//! half of its transport stream. Handles are cheap to clone; every clone refers
//! to the same stream, so the registry, broadcast snapshots and the owning
//! session task all see the same open/closed state.

use std::{
    fmt,
    net::SocketAddr,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, watch},
};

use super::timestamp::Timestamp;

/// Longest display name kept, in bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 63;

/// Process-unique identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Hands out connection ids. Never reuses a value.
#[derive(Debug)]
pub struct ConnectionIdFactory {
    next: AtomicU64,
}

impl Default for ConnectionIdFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionIdFactory {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn generate(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Name shown in `[<name>]` prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    /// Build a display name from the handshake line.
    ///
    /// Surrounding whitespace (including the line terminator) is stripped and
    /// the result is cut to [`MAX_DISPLAY_NAME_LEN`] bytes on a char boundary.
    /// An empty name falls back to the peer's `address:port`.
    pub fn from_handshake(raw: &str, peer: SocketAddr) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self(peer.to_string());
        }

        let mut end = trimmed.len().min(MAX_DISPLAY_NAME_LEN);
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        Self(trimmed[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write half of a connection, type-erased so tests can use in-memory pipes.
pub type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

struct Inner {
    id: ConnectionId,
    name: DisplayName,
    connected_at: Timestamp,
    writer: Mutex<BoxedWriter>,
    closed: watch::Sender<bool>,
}

/// Shared handle to one live connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn new<W>(id: ConnectionId, name: DisplayName, connected_at: Timestamp, writer: W) -> Self
    where
        W: AsyncWrite + Send + 'static,
    {
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                id,
                name,
                connected_at,
                writer: Mutex::new(Box::pin(writer)),
                closed,
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn name(&self) -> &DisplayName {
        &self.inner.name
    }

    /// When the connection completed its handshake.
    pub fn connected_at(&self) -> Timestamp {
        self.inner.connected_at
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Write every byte and flush.
    ///
    /// Sends to the same handle are serialized, so a recipient never sees two
    /// lines interleaved. A write stuck on an unresponsive peer is abandoned
    /// as soon as the handle is closed.
    pub async fn send(&self, bytes: &[u8]) -> std::io::Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }

        let mut closed = self.inner.closed.subscribe();
        let mut writer = self.inner.writer.lock().await;
        tokio::select! {
            result = async {
                writer.write_all(bytes).await?;
                writer.flush().await
            } => result,
            _ = closed.wait_for(|closed| *closed) => Err(closed_error()),
        }
    }

    /// Completes once [`close`](Self::close) has been called on any clone.
    pub async fn closed(&self) {
        let mut closed = self.inner.closed.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Close the connection. Idempotent.
    ///
    /// Wakes the owning session's pending read (through [`closed`](Self::closed))
    /// and shuts the write side down so the peer sees end-of-stream.
    pub async fn close(&self) {
        let already_closed = self.inner.closed.send_replace(true);
        if already_closed {
            return;
        }

        let mut writer = self.inner.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!("Shutdown of {} failed: {}", self.inner.id, e);
        }
    }
}

fn closed_error() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "connection closed")
}
