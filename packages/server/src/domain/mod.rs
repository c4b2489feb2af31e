//! Domain layer: value types, the connection handle, and the traits the use
//! cases depend on.

pub mod connection;
pub mod error;
pub mod history;
pub mod line;
pub mod timestamp;

pub use connection::{
    BoxedWriter, ConnectionHandle, ConnectionId, ConnectionIdFactory, DisplayName,
    MAX_DISPLAY_NAME_LEN,
};
pub use error::AdmitError;
pub use history::HistoryLog;
#[cfg(test)]
pub use history::MockHistoryLog;
pub use line::{
    ChatLine, DEFAULT_MAX_LINE_LEN, DEFAULT_READ_BUFFER_SIZE, SERVER_FULL_NOTICE, SHUTDOWN_NOTICE,
};
pub use timestamp::Timestamp;
