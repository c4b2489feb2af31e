//! UI layer: the TCP listener, per-connection handlers and the operator
//! shutdown triggers.

pub mod config;
pub mod error;
pub mod handler;
pub mod server;
pub mod signal;
pub mod state;

pub use config::ServerConfig;
pub use error::{HandshakeError, ServerError};
pub use server::Server;
pub use signal::shutdown_signal;
pub use state::AppState;
