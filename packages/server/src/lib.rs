//! Line-oriented TCP chat relay.
//!
//! Clients connect, send a display name as their first line, then every chunk
//! they send is relayed to every other connected client as
//! `[<name>] <text>\n` and appended to a history log.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
