//! UseCase: セッションの入室処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - AdmitSessionUseCase::execute()（容量チェック付きの登録）
//! - AdmitSessionUseCase::announce_joined()（join アナウンスと履歴への記録）
//!
//! ### どのような状況を想定しているか
//! - 正常系：空きがある状態での入室
//! - 異常系：容量超過での入室試行（登録されないこと）
//! - 異常系：シャットダウン後の入室試行

use std::sync::Arc;

use crate::{
    domain::{AdmitError, ChatLine, ConnectionHandle, HistoryLog},
    infrastructure::{Broadcaster, DeliveryReport, Membership},
};

/// セッション入室のユースケース
pub struct AdmitSessionUseCase {
    broadcaster: Arc<Broadcaster>,
    history: Arc<dyn HistoryLog>,
}

impl AdmitSessionUseCase {
    pub fn new(broadcaster: Arc<Broadcaster>, history: Arc<dyn HistoryLog>) -> Self {
        Self {
            broadcaster,
            history,
        }
    }

    /// 入室を実行
    ///
    /// # Returns
    ///
    /// * `Ok(Membership)` - 登録成功。guard が drop されると登録が解除される
    /// * `Err(AdmitError)` - 容量超過またはシャットダウン中（登録はされない）
    pub fn execute(&self, handle: ConnectionHandle) -> Result<Membership, AdmitError> {
        Membership::admit(self.broadcaster.registry().clone(), handle)
    }

    /// `[<name>] joined` を本人以外に配信し、履歴に記録する
    pub async fn announce_joined(&self, handle: &ConnectionHandle) -> DeliveryReport {
        let line = ChatLine::joined(handle.name());
        let report = self.broadcaster.broadcast_except(handle.id(), &line).await;
        self.history.append(line.as_log_bytes()).await;
        report
    }
}
