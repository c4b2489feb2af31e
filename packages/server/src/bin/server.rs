//! Line-oriented TCP chat relay server.
//!
//! Every line a client sends is relayed to every other connected client as
//! `[<name>] <text>` and appended to the history file. Press Enter on the
//! console (or send Ctrl+C / SIGTERM) to shut down gracefully.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin relay-server
//! cargo run --bin relay-server -- --port 4267 --capacity 8 --history chat_history
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use relay_server::{
    infrastructure::{DEFAULT_CAPACITY, DEFAULT_HISTORY_PATH, FileHistoryLog},
    ui::{
        Server, ServerConfig, shutdown_signal,
        config::{DEFAULT_HOST, DEFAULT_PORT},
    },
};
use relay_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "relay-server")]
#[command(about = "Line-oriented TCP chat relay with an append-only history log", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of concurrently connected clients
    #[arg(short = 'c', long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// History file, opened in append mode
    #[arg(long, default_value = DEFAULT_HISTORY_PATH)]
    history: PathBuf,

    /// Do not read the console; shut down only on Ctrl+C / SIGTERM
    #[arg(long)]
    no_console: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            capacity: self.capacity,
            history_path: self.history,
            console: !self.no_console,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(&[env!("CARGO_PKG_NAME"), env!("CARGO_BIN_NAME")], "info");

    let config = Args::parse().into_config();
    let console = config.console;
    let history = Arc::new(FileHistoryLog::new(&config.history_path));

    let server = match Server::bind(config, history).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    };

    server.run(shutdown_signal(console)).await;

    // A console read may still be parked on stdin; exit rather than wait for
    // the runtime to drain it.
    std::process::exit(0);
}
