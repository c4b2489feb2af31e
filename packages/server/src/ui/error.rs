//! Error types for the relay server.

use thiserror::Error;

/// Fatal startup errors. No session exists yet when these occur.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured host/port did not resolve to a socket address
    #[error("Invalid listen address '{0}'")]
    InvalidAddress(String),

    /// Socket creation or option setup failed
    #[error("Socket error: {0}")]
    Socket(#[source] std::io::Error),

    /// Bind or listen failed
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why the identity handshake did not produce a name.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The peer closed the stream before a full line arrived
    #[error("connection closed before the name line")]
    Closed,

    /// The name line exceeded the maximum line length
    #[error("name line longer than {0} bytes")]
    LineTooLong(usize),

    #[error("read error during handshake: {0}")]
    Io(#[from] std::io::Error),
}
