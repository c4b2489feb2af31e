//! UseCase layer: one struct per chat event, composed by the TCP session
//! handler.

pub mod admit_session;
pub mod leave_session;
pub mod relay_message;
pub mod shutdown;

pub use admit_session::AdmitSessionUseCase;
pub use leave_session::LeaveSessionUseCase;
pub use relay_message::RelayMessageUseCase;
pub use shutdown::{SHUTDOWN_GRACE, ShutdownUseCase};
