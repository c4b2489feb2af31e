//! TCP listener and admission loop.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::{domain::HistoryLog, infrastructure::SessionRegistry};

use super::{config::ServerConfig, error::ServerError, handler::handle_connection, state::AppState};

/// Pause after a non-transient accept error so a persistent failure
/// (e.g. out of file descriptors) does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Chat relay server
///
/// Binding is separate from running so callers can learn the actual address
/// (port 0 in tests) before the loop starts.
///
/// # Example
///
/// ```ignore
/// let history = Arc::new(FileHistoryLog::new("chat_history"));
/// let server = Server::bind(ServerConfig::default(), history).await?;
/// server.run(shutdown_signal(true)).await;
/// ```
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// The socket is created with `SO_REUSEADDR` so a restarted server can
    /// bind immediately. Every failure here is fatal.
    pub async fn bind(config: ServerConfig, history: Arc<dyn HistoryLog>) -> Result<Self, ServerError> {
        Self::with_state(Arc::new(AppState::new(config, history))).await
    }

    pub async fn with_state(state: Arc<AppState>) -> Result<Self, ServerError> {
        let bind_addr = state.config.bind_addr();
        let addr = tokio::net::lookup_host(&bind_addr)
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ServerError::InvalidAddress(bind_addr.clone()))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(ServerError::Socket)?;
        socket.set_reuseaddr(true).map_err(ServerError::Socket)?;

        let bind_error = |source| ServerError::Bind {
            addr: bind_addr.clone(),
            source,
        };
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(state.config.backlog()).map_err(bind_error)?;

        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.state.registry.clone()
    }

    /// Accept connections until `shutdown` completes, then shut down.
    ///
    /// Each accepted connection gets its own task; the loop never waits for
    /// one. Returns the number of sessions closed by the shutdown.
    pub async fn run<F>(self, shutdown: F) -> usize
    where
        F: Future<Output = ()> + Send,
    {
        let Self { listener, state } = self;

        match listener.local_addr() {
            Ok(addr) => tracing::info!(
                "Chat relay listening on {} (capacity {})",
                addr,
                state.config.capacity
            ),
            Err(e) => tracing::warn!("Listening, but local address is unavailable: {}", e),
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => spawn_session(&state, stream, peer),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        let closed = state.shutdown_usecase.execute().await;
        drop(listener);
        tracing::info!("Server shut down gracefully ({} session(s) closed)", closed);

        closed
    }
}

fn spawn_session(state: &Arc<AppState>, stream: TcpStream, peer: SocketAddr) {
    tracing::debug!("Accepted connection from {}", peer);
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
    }

    let (reader, writer) = stream.into_split();
    tokio::spawn(handle_connection(state.clone(), reader, writer, peer));
}
