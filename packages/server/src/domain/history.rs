//! History log trait.
//!
//! Use cases depend on this trait; `infrastructure::history` provides the
//! file-backed implementation.

use async_trait::async_trait;

/// Append-only, best-effort record of every chat event.
///
/// Implementations must serialize writers so that lines never interleave, and
/// must never surface a failure to the caller: losing history is preferable
/// to interrupting delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryLog: Send + Sync {
    /// Append one line exactly as given (no trailing newline). The
    /// implementation adds a single `\n`. The bytes need not be UTF-8.
    async fn append(&self, line: &[u8]);

    /// Flush and release the underlying target. Later appends are no-ops.
    async fn close(&self);
}
