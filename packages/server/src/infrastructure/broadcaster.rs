//! Broadcast engine over TCP connection handles.
//!
//! ## 責務
//!
//! - レジストリのスナップショットを取得し、ロックを解放してから送信する
//! - 送信元を除く全員への配信（`broadcast_except`）と全員への配信（`broadcast_all`）
//! - 期限付きの配信（`deliver_within`）: シャットダウン時、読まないクライアントで
//!   止まらないようにする
//!
//! ## 設計ノート
//!
//! 各受信者への送信は並行に行います。ある受信者への書き込みが失敗しても、
//! その受信者の分だけを諦め、他の受信者への配信は続行します（再送はしません）。
//! 壊れた接続は、その接続自身のセッションがまもなく検出して退室させます。

use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;

use crate::domain::{ChatLine, ConnectionHandle, ConnectionId};

use super::registry::SessionRegistry;

/// Outcome of one broadcast call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Deliver `line` to every registered connection except `origin`.
    pub async fn broadcast_except(&self, origin: ConnectionId, line: &ChatLine) -> DeliveryReport {
        let targets: Vec<ConnectionHandle> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|handle| handle.id() != origin)
            .collect();

        deliver(&targets, line, None).await
    }

    /// Deliver `line` to every registered connection.
    pub async fn broadcast_all(&self, line: &ChatLine) -> DeliveryReport {
        deliver(&self.registry.snapshot(), line, None).await
    }

    /// Deliver `line` to `targets`, giving up on each one after `limit`.
    ///
    /// The targets need not be registered. A recipient whose write is still
    /// pending at the deadline counts as failed and its write is abandoned.
    pub async fn deliver_within(
        &self,
        targets: &[ConnectionHandle],
        line: &ChatLine,
        limit: Duration,
    ) -> DeliveryReport {
        deliver(targets, line, Some(limit)).await
    }
}

async fn deliver(
    targets: &[ConnectionHandle],
    line: &ChatLine,
    limit: Option<Duration>,
) -> DeliveryReport {
    let outcomes = join_all(targets.iter().map(|target| async move {
        let sent = match limit {
            Some(limit) => match tokio::time::timeout(limit, target.send(line.as_bytes())).await {
                Ok(sent) => sent,
                Err(_) => {
                    tracing::warn!(
                        "Gave up delivering to {} ({}) after {:?}",
                        target.id(),
                        target.name(),
                        limit
                    );
                    return false;
                }
            },
            None => target.send(line.as_bytes()).await,
        };

        match sent {
            Ok(()) => {
                tracing::debug!("Delivered {} bytes to {}", line.len(), target.id());
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to deliver to {} ({}): {}",
                    target.id(),
                    target.name(),
                    e
                );
                false
            }
        }
    }))
    .await;

    let delivered = outcomes.iter().filter(|ok| **ok).count();
    DeliveryReport {
        delivered,
        failed: outcomes.len() - delivered,
    }
}
