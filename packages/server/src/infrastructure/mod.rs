//! Infrastructure layer: concrete registry, broadcast engine and history log.

pub mod broadcaster;
pub mod history;
pub mod registry;

pub use broadcaster::{Broadcaster, DeliveryReport};
pub use history::{DEFAULT_HISTORY_PATH, FileHistoryLog};
pub use registry::{DEFAULT_CAPACITY, Membership, SessionRegistry};
