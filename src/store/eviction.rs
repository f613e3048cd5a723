//! Eviction Policy Module
//!
//! Chooses which entry leaves the store when a fresh insert finds it full.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::EntryMeta;

// == Eviction Policy ==
/// Victim selection strategy.
///
/// Policies are stateless: they only look at the metadata snapshot they are
/// handed, so the store can run them without holding any shard lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently used
    #[default]
    Lru,
    /// Least frequently used, ties broken least-recently-used
    Lfu,
    /// First in, first out
    Fifo,
}

impl EvictionPolicy {
    // == Select Victim ==
    /// Returns the candidate this policy evicts first.
    ///
    /// Every ordering ends in the insertion sequence, so the choice is
    /// deterministic for any snapshot. Returns None for an empty snapshot.
    pub fn select_victim<'a, K>(
        &self,
        candidates: &'a [(K, EntryMeta)],
    ) -> Option<&'a (K, EntryMeta)> {
        match self {
            EvictionPolicy::Lru => candidates.iter().min_by_key(|(_, meta)| meta.recency()),
            EvictionPolicy::Lfu => candidates
                .iter()
                .min_by_key(|(_, meta)| (meta.access_count, meta.recency())),
            EvictionPolicy::Fifo => candidates
                .iter()
                .min_by_key(|(_, meta)| (meta.created_at, meta.created_seq)),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Lfu => "lfu",
            EvictionPolicy::Fifo => "fifo",
        };
        f.write_str(name)
    }
}

impl FromStr for EvictionPolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            "fifo" => Ok(EvictionPolicy::Fifo),
            other => Err(StoreError::InvalidConfig(format!(
                "unknown eviction policy '{}' (expected lru, lfu or fifo)",
                other
            ))),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn meta(created_at: u64, last_accessed_at: u64, access_count: u64, seq: u64) -> EntryMeta {
        EntryMeta {
            created_at,
            updated_at: created_at,
            last_accessed_at,
            access_count,
            created_seq: seq,
            accessed_seq: seq,
        }
    }

    #[test]
    fn test_empty_snapshot_has_no_victim() {
        let candidates: Vec<(&str, EntryMeta)> = Vec::new();
        assert!(EvictionPolicy::Lru.select_victim(&candidates).is_none());
        assert!(EvictionPolicy::Lfu.select_victim(&candidates).is_none());
        assert!(EvictionPolicy::Fifo.select_victim(&candidates).is_none());
    }

    #[test]
    fn test_lru_picks_oldest_access() {
        let candidates = vec![
            ("a", meta(0, 30, 0, 1)),
            ("b", meta(10, 20, 0, 2)),
            ("c", meta(20, 25, 0, 3)),
        ];

        let (key, _) = EvictionPolicy::Lru.select_victim(&candidates).unwrap();
        assert_eq!(*key, "b");
    }

    #[test]
    fn test_lru_tie_breaks_on_creation_then_sequence() {
        let mut older = meta(5, 50, 0, 9);
        older.accessed_seq = 3;
        let mut newer = meta(6, 50, 0, 1);
        newer.accessed_seq = 3;

        let candidates = vec![("newer", newer), ("older", older)];
        let (key, _) = EvictionPolicy::Lru.select_victim(&candidates).unwrap();
        assert_eq!(*key, "older");

        let mut twin = older;
        twin.created_seq = 2;
        let candidates = vec![("older", older), ("twin", twin)];
        let (key, _) = EvictionPolicy::Lru.select_victim(&candidates).unwrap();
        assert_eq!(*key, "twin");
    }

    #[test]
    fn test_lfu_picks_least_used() {
        let candidates = vec![
            ("hot", meta(0, 5, 10, 1)),
            ("cold", meta(1, 40, 1, 2)),
            ("warm", meta(2, 30, 4, 3)),
        ];

        let (key, _) = EvictionPolicy::Lfu.select_victim(&candidates).unwrap();
        assert_eq!(*key, "cold");
    }

    #[test]
    fn test_lfu_ties_fall_back_to_recency() {
        let candidates = vec![("recent", meta(0, 40, 2, 1)), ("stale", meta(1, 10, 2, 2))];

        let (key, _) = EvictionPolicy::Lfu.select_victim(&candidates).unwrap();
        assert_eq!(*key, "stale");
    }

    #[test]
    fn test_fifo_ignores_access() {
        let candidates = vec![("first", meta(0, 99, 50, 1)), ("second", meta(1, 2, 0, 2))];

        let (key, _) = EvictionPolicy::Fifo.select_victim(&candidates).unwrap();
        assert_eq!(*key, "first");
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("LRU".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lru);
        assert_eq!(" lfu ".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lfu);
        assert_eq!("fifo".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Fifo);
        assert!(matches!(
            "random".parse::<EvictionPolicy>(),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for policy in [EvictionPolicy::Lru, EvictionPolicy::Lfu, EvictionPolicy::Fifo] {
            assert_eq!(policy.to_string().parse::<EvictionPolicy>().unwrap(), policy);
        }
    }
}
