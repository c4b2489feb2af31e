//! Utilities shared by the relay server binary and its tests.

pub mod logger;
pub mod time;
