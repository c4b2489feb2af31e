//! Operator shutdown triggers.
//!
//! Shutdown starts on whichever comes first: Ctrl+C, SIGTERM (unix), or a
//! line on the operator console. End-of-file on stdin counts as a line, so a
//! server started with stdin closed should run with the console disabled.

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    signal,
};

/// Completes when the operator asks the server to stop.
pub async fn shutdown_signal(console: bool) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let console = async {
        if console {
            operator_console().await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
        _ = console => tracing::info!("Shutdown requested from console"),
    }
}

async fn operator_console() {
    tracing::info!("Press Enter to shut down the server gracefully");

    let mut line = String::new();
    match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
        Ok(0) => tracing::debug!("Console reached end of input"),
        Ok(_) => {}
        Err(e) => tracing::warn!("Console read failed: {}", e),
    }
}
