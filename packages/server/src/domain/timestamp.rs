//! Unix-millisecond timestamps.

use std::fmt;

use relay_shared::time::millis_to_rfc3339;

/// Instant in Unix milliseconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Milliseconds from `self` to `later`, or 0 if `later` is earlier.
    pub fn millis_until(self, later: Timestamp) -> i64 {
        (later.0 - self.0).max(0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&millis_to_rfc3339(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_rfc3339() {
        // テスト項目: 表示形式は RFC 3339 (UTC, ミリ秒)
        // given (前提条件):
        let timestamp = Timestamp::new(1_672_531_200_123);

        // when (操作):
        let text = timestamp.to_string();

        // then (期待する結果):
        assert_eq!(text, "2023-01-01T00:00:00.123Z");
    }

    #[test]
    fn test_millis_until_never_negative() {
        // テスト項目: 経過時間は負にならない（時計が戻った場合は 0）
        // given (前提条件):
        let connected_at = Timestamp::new(10_000);

        // when (操作):
        let forward = connected_at.millis_until(Timestamp::new(12_500));
        let backward = connected_at.millis_until(Timestamp::new(9_000));

        // then (期待する結果):
        assert_eq!(forward, 2_500);
        assert_eq!(backward, 0);
    }
}
