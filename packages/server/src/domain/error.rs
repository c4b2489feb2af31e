//! Domain errors.

use thiserror::Error;

use super::connection::ConnectionId;

/// Reasons a connection is refused a registry slot.
///
/// These are policy outcomes rather than faults: the caller tells the peer
/// and closes the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmitError {
    #[error("registry is at capacity ({capacity})")]
    AtCapacity { capacity: usize },

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("connection {0} is already registered")]
    Duplicate(ConnectionId),
}
