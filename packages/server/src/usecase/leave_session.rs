//! UseCase: セッションの退室処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - LeaveSessionUseCase::execute()
//! - left アナウンス、履歴への記録、レジストリからの削除、接続のクローズ
//!
//! ### どのような状況を想定しているか
//! - 正常系：他の参加者がいる状態での退室
//! - エッジケース：シャットダウンで既にレジストリから外されている場合（削除は冪等）

use std::sync::Arc;

use crate::{
    domain::{ChatLine, ConnectionHandle, HistoryLog},
    infrastructure::{Broadcaster, DeliveryReport, Membership},
};

/// セッション退室のユースケース
pub struct LeaveSessionUseCase {
    broadcaster: Arc<Broadcaster>,
    history: Arc<dyn HistoryLog>,
}

impl LeaveSessionUseCase {
    pub fn new(broadcaster: Arc<Broadcaster>, history: Arc<dyn HistoryLog>) -> Self {
        Self {
            broadcaster,
            history,
        }
    }

    /// 退室を実行
    ///
    /// `[<name>] left` を本人以外に配信して履歴に記録し、レジストリから削除して
    /// 接続を閉じる。
    pub async fn execute(&self, handle: &ConnectionHandle, membership: &Membership) -> DeliveryReport {
        let line = ChatLine::left(handle.name());
        let report = self.broadcaster.broadcast_except(handle.id(), &line).await;
        self.history.append(line.as_log_bytes()).await;

        if !membership.release() {
            tracing::debug!("{} was already evicted", handle.id());
        }
        handle.close().await;

        report
    }
}
