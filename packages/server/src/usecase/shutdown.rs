//! UseCase: サーバーのシャットダウン処理
//!
//! レジストリを drain してから、取り出した全員にシャットダウン通知を配信し、
//! 全接続を閉じ、履歴ログを閉じます。
//!
//! 通知は受信者ごとに猶予時間（`SHUTDOWN_GRACE`）付きで送ります。読み込みを
//! 止めたクライアントがいても、猶予が過ぎればその接続は閉じられます。
//!
//! 接続を閉じると各セッションの読み込み待ちが終了し、各セッション自身の
//! 退室処理が走ります（他のタスクを外部から強制終了することはしません）。
//! drain 済みのレジストリは以降の入室を拒否するため、シャットダウン中に
//! 新しいセッションが紛れ込むことはありません。

use std::{sync::Arc, time::Duration};

use crate::{
    domain::{ChatLine, HistoryLog, SHUTDOWN_NOTICE},
    infrastructure::Broadcaster,
};

/// How long each session gets to accept the shutdown notice.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// シャットダウンのユースケース
pub struct ShutdownUseCase {
    broadcaster: Arc<Broadcaster>,
    history: Arc<dyn HistoryLog>,
    grace: Duration,
}

impl ShutdownUseCase {
    pub fn new(broadcaster: Arc<Broadcaster>, history: Arc<dyn HistoryLog>) -> Self {
        Self {
            broadcaster,
            history,
            grace: SHUTDOWN_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// シャットダウンを実行
    ///
    /// # Returns
    ///
    /// 閉じたセッションの数
    pub async fn execute(&self) -> usize {
        let drained = self.broadcaster.registry().drain_all();

        let notice = ChatLine::notice(SHUTDOWN_NOTICE);
        let report = self
            .broadcaster
            .deliver_within(&drained, &notice, self.grace)
            .await;
        tracing::info!(
            "Shutdown notice delivered to {} session(s) ({} failed)",
            report.delivered,
            report.failed
        );

        for handle in &drained {
            handle.close().await;
        }

        self.history.close().await;
        drained.len()
    }
}
