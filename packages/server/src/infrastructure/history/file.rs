//! File-backed history log.
//!
//! The file is opened lazily in append mode on the first `append`. Every line
//! is flushed and synced before `append` returns. If the file cannot be
//! opened the log gives up for the rest of the process: chat keeps flowing,
//! history is simply not kept.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};

use crate::domain::HistoryLog;

/// Default history file name, relative to the working directory.
pub const DEFAULT_HISTORY_PATH: &str = "chat_history";

enum LogState {
    Unopened,
    Open(File),
    Failed,
    Closed,
}

pub struct FileHistoryLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl FileHistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(LogState::Unopened),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
    }
}

#[async_trait]
impl HistoryLog for FileHistoryLog {
    async fn append(&self, line: &[u8]) {
        let mut state = self.state.lock().await;

        if matches!(*state, LogState::Unopened) {
            *state = match self.open().await {
                Ok(file) => {
                    tracing::info!("History log opened at {}", self.path.display());
                    LogState::Open(file)
                }
                Err(e) => {
                    tracing::warn!(
                        "Cannot open history log {}: {}; history is disabled",
                        self.path.display(),
                        e
                    );
                    LogState::Failed
                }
            };
        }

        let LogState::Open(file) = &mut *state else {
            return;
        };

        let mut record = Vec::with_capacity(line.len() + 1);
        record.extend_from_slice(line);
        record.push(b'\n');

        let written = async {
            file.write_all(&record).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;
        if let Err(e) = written {
            tracing::warn!("Failed to append to history log: {}", e);
        }
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        if let LogState::Open(file) = &mut *state
            && let Err(e) = file.flush().await
        {
            tracing::warn!("Failed to flush history log on close: {}", e);
        }
        *state = LogState::Closed;
    }
}
