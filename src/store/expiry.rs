//! Expiry Policy Module
//!
//! Decides whether an entry is still visible given its metadata and the
//! current time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::EntryMeta;

// == Expiry Policy ==
/// Time-based expiry thresholds.
///
/// Boundary condition: an entry is expired once the elapsed time is greater
/// than or equal to the threshold, so a fully elapsed duration expires the
/// entry immediately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryPolicy {
    /// Lifetime measured from the last write, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live_ms: Option<u64>,
    /// Idle time measured from the last access, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_idle_ms: Option<u64>,
}

impl ExpiryPolicy {
    /// Entries never expire.
    pub fn eternal() -> Self {
        Self::default()
    }

    /// Entries expire `ttl` after their last write.
    pub fn time_to_live(ttl: Duration) -> Self {
        Self::eternal().with_time_to_live(ttl)
    }

    /// Entries expire after `tti` without a read or write.
    pub fn time_to_idle(tti: Duration) -> Self {
        Self::eternal().with_time_to_idle(tti)
    }

    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live_ms = Some(ttl.as_millis() as u64);
        self
    }

    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle_ms = Some(tti.as_millis() as u64);
        self
    }

    /// True when no threshold is configured.
    pub fn is_eternal(&self) -> bool {
        self.time_to_live_ms.is_none() && self.time_to_idle_ms.is_none()
    }

    // == Expired For Read ==
    /// Whether the entry is gone: reads report it absent and writes replace it
    /// as a fresh insert.
    pub fn is_expired_for_read(&self, meta: &EntryMeta, now: u64) -> bool {
        self.is_expired_for_write(meta, now)
            || self
                .time_to_idle_ms
                .is_some_and(|tti| now.saturating_sub(meta.last_accessed_at) >= tti)
    }

    // == Expired For Write ==
    /// Whether the last write has outlived its time-to-live. Idle time never
    /// ages the written value itself.
    pub fn is_expired_for_write(&self, meta: &EntryMeta, now: u64) -> bool {
        self.time_to_live_ms
            .is_some_and(|ttl| now.saturating_sub(meta.updated_at) >= ttl)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn written_at(updated_at: u64, last_accessed_at: u64) -> EntryMeta {
        EntryMeta {
            created_at: updated_at,
            updated_at,
            last_accessed_at,
            access_count: 0,
            created_seq: 0,
            accessed_seq: 0,
        }
    }

    #[test]
    fn test_eternal_never_expires() {
        let policy = ExpiryPolicy::eternal();
        let meta = written_at(0, 0);

        assert!(policy.is_eternal());
        assert!(!policy.is_expired_for_read(&meta, u64::MAX));
        assert!(!policy.is_expired_for_write(&meta, u64::MAX));
    }

    #[test]
    fn test_time_to_live_boundary() {
        let policy = ExpiryPolicy::time_to_live(Duration::from_millis(10));
        let meta = written_at(0, 0);

        assert!(!policy.is_expired_for_read(&meta, 9));
        assert!(policy.is_expired_for_read(&meta, 10));
        assert!(policy.is_expired_for_read(&meta, 11));
        assert!(policy.is_expired_for_write(&meta, 10));
    }

    #[test]
    fn test_reads_do_not_extend_time_to_live() {
        let policy = ExpiryPolicy::time_to_live(Duration::from_millis(10));
        let meta = written_at(0, 9);

        assert!(policy.is_expired_for_read(&meta, 11));
    }

    #[test]
    fn test_time_to_idle_boundary() {
        let policy = ExpiryPolicy::time_to_idle(Duration::from_millis(10));
        let meta = written_at(0, 5);

        assert!(!policy.is_expired_for_read(&meta, 14));
        assert!(policy.is_expired_for_read(&meta, 15));
        assert!(!policy.is_expired_for_write(&meta, 100));
    }

    #[test]
    fn test_clock_behind_entry_is_not_expired() {
        let policy = ExpiryPolicy::time_to_live(Duration::from_millis(10));
        let meta = written_at(100, 100);

        assert!(!policy.is_expired_for_read(&meta, 50));
    }

    #[test]
    fn test_serde_shape() {
        let policy = ExpiryPolicy::time_to_live(Duration::from_secs(1));
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(json, r#"{"time_to_live_ms":1000}"#);

        let parsed: ExpiryPolicy = serde_json::from_str(r#"{"time_to_idle_ms":5}"#).unwrap();
        assert_eq!(parsed, ExpiryPolicy::time_to_idle(Duration::from_millis(5)));
    }
}
