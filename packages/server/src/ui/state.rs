//! Shared application state handed to every session task.

use std::sync::Arc;

use relay_shared::time::{Clock, SystemClock};

use crate::{
    domain::{ConnectionIdFactory, HistoryLog},
    infrastructure::{Broadcaster, SessionRegistry},
    usecase::{AdmitSessionUseCase, LeaveSessionUseCase, RelayMessageUseCase, ShutdownUseCase},
};

use super::config::ServerConfig;

pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<SessionRegistry>,
    pub connection_ids: ConnectionIdFactory,
    pub clock: Arc<dyn Clock>,
    pub admit_session_usecase: AdmitSessionUseCase,
    pub relay_message_usecase: RelayMessageUseCase,
    pub leave_session_usecase: LeaveSessionUseCase,
    pub shutdown_usecase: ShutdownUseCase,
}

impl AppState {
    /// Wire registry, broadcaster, history and use cases together.
    pub fn new(config: ServerConfig, history: Arc<dyn HistoryLog>) -> Self {
        Self::with_clock(config, history, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ServerConfig,
        history: Arc<dyn HistoryLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.capacity));
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));

        Self {
            admit_session_usecase: AdmitSessionUseCase::new(broadcaster.clone(), history.clone()),
            relay_message_usecase: RelayMessageUseCase::new(
                broadcaster.clone(),
                history.clone(),
                config.max_line_len,
            ),
            leave_session_usecase: LeaveSessionUseCase::new(broadcaster.clone(), history.clone()),
            shutdown_usecase: ShutdownUseCase::new(broadcaster, history),
            connection_ids: ConnectionIdFactory::new(),
            clock,
            registry,
            config,
        }
    }
}
