//! In-memory session registry.
//!
//! ## 責務
//!
//! - 接続中のセッション（`ConnectionHandle`）を容量付きで管理する
//! - 容量チェックと挿入を 1 回のロック内で行う（check-then-act 競合の防止）
//! - ブロードキャスト用のスナップショットを返す（ロックは I/O の前に解放）
//! - シャットダウン時に全メンバーを取り出し、以降の入室を拒否する
//!
//! ロックは `std::sync::Mutex` を使います。クリティカルセクションは短く、
//! `.await` をまたいで保持されることはありません。また `Membership` の
//! `Drop` から同期的に削除できる必要があります。

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::domain::{AdmitError, ConnectionHandle, ConnectionId};

/// Default number of concurrent sessions.
pub const DEFAULT_CAPACITY: usize = 8;

#[derive(Default)]
struct RegistryState {
    members: BTreeMap<ConnectionId, ConnectionHandle>,
    draining: bool,
}

/// Bounded set of live connections.
pub struct SessionRegistry {
    capacity: usize,
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(RegistryState::default()),
        }
    }

    // A panic elsewhere never leaves the map half-updated: every mutation is a
    // single insert/remove/take, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register `handle` if there is room.
    ///
    /// The capacity check and the insert happen under one lock acquisition.
    /// A rejected handle is never inserted, so no broadcast can observe it.
    pub fn try_admit(&self, handle: ConnectionHandle) -> Result<(), AdmitError> {
        let mut state = self.lock();

        if state.draining {
            return Err(AdmitError::ShuttingDown);
        }
        if state.members.contains_key(&handle.id()) {
            return Err(AdmitError::Duplicate(handle.id()));
        }
        if state.members.len() >= self.capacity {
            return Err(AdmitError::AtCapacity {
                capacity: self.capacity,
            });
        }

        let id = handle.id();
        state.members.insert(id, handle);
        tracing::debug!(
            "{} registered ({}/{})",
            id,
            state.members.len(),
            self.capacity
        );
        Ok(())
    }

    /// Remove `id` if present. Returns whether anything was removed.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.lock().members.remove(&id).is_some();
        if removed {
            tracing::debug!("{} unregistered", id);
        }
        removed
    }

    /// Copy of the current members in admission order.
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.lock().members.values().cloned().collect()
    }

    /// Empty the registry and refuse every later admission.
    ///
    /// Returns the former members in admission order.
    pub fn drain_all(&self) -> Vec<ConnectionHandle> {
        let mut state = self.lock();
        state.draining = true;
        std::mem::take(&mut state.members).into_values().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().members.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Registry slot owned by a session task.
///
/// Dropping the guard removes the entry, so a session is evicted on every
/// exit path. Removal is idempotent; an explicit `release` followed by the
/// drop is harmless.
pub struct Membership {
    registry: Arc<SessionRegistry>,
    id: ConnectionId,
}

impl Membership {
    /// Admit `handle` and return the guard for its slot.
    pub fn admit(
        registry: Arc<SessionRegistry>,
        handle: ConnectionHandle,
    ) -> Result<Self, AdmitError> {
        let id = handle.id();
        registry.try_admit(handle)?;
        Ok(Self { registry, id })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remove the entry now. Returns whether it was still registered.
    pub fn release(&self) -> bool {
        self.registry.remove(self.id)
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
