//! UseCase: メッセージ中継処理
//!
//! 受信したチャンクを `[<name>] <payload>` 形式の 1 行に整形し、送信者以外の
//! 全員に配信してから履歴に記録します。

use std::sync::Arc;

use crate::{
    domain::{ChatLine, ConnectionHandle, HistoryLog},
    infrastructure::{Broadcaster, DeliveryReport},
};

/// メッセージ中継のユースケース
pub struct RelayMessageUseCase {
    broadcaster: Arc<Broadcaster>,
    history: Arc<dyn HistoryLog>,
    max_line_len: usize,
}

impl RelayMessageUseCase {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        history: Arc<dyn HistoryLog>,
        max_line_len: usize,
    ) -> Self {
        Self {
            broadcaster,
            history,
            max_line_len,
        }
    }

    /// メッセージ中継を実行
    ///
    /// # Arguments
    ///
    /// * `sender` - 送信者のハンドル（配信対象から除外される）
    /// * `payload` - 受信した生のバイト列
    pub async fn execute(&self, sender: &ConnectionHandle, payload: &[u8]) -> DeliveryReport {
        let line = ChatLine::relay(sender.name(), payload, self.max_line_len);
        tracing::debug!(
            "Relaying {} bytes from '{}' ({})",
            line.len(),
            sender.name(),
            sender.id()
        );

        let report = self.broadcaster.broadcast_except(sender.id(), &line).await;
        self.history.append(line.as_log_bytes()).await;
        report
    }
}
