//! Connection handlers.

pub mod session;

pub use session::{LeaveReason, handle_connection, read_handshake};
