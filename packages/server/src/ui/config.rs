//! Server configuration.

use std::path::PathBuf;

use crate::{
    domain::{DEFAULT_MAX_LINE_LEN, DEFAULT_READ_BUFFER_SIZE},
    infrastructure::{DEFAULT_CAPACITY, DEFAULT_HISTORY_PATH},
};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 4267;

/// Runtime settings of the relay. `Default` listens on every interface,
/// port 4267, with room for 8 sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Maximum number of concurrently registered sessions.
    pub capacity: usize,
    /// Bytes read from a client per chunk.
    pub read_buffer_size: usize,
    /// Maximum relayed line size, prefix and newline included.
    pub max_line_len: usize,
    pub history_path: PathBuf,
    /// Whether the operator console (stdin) can trigger shutdown.
    pub console: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            capacity: DEFAULT_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            console: true,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Listen backlog: the capacity, at least 1.
    pub fn backlog(&self) -> u32 {
        u32::try_from(self.capacity.max(1)).unwrap_or(u32::MAX)
    }
}
