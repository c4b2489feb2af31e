//! History log implementations.
//!
//! - `file`: append-only file

pub mod file;

pub use file::{DEFAULT_HISTORY_PATH, FileHistoryLog};
