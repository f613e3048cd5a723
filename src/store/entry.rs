//! Store Entry Module
//!
//! Defines a stored value together with the metadata eviction and expiry
//! policies decide on.

use std::sync::atomic::{AtomicU64, Ordering};

// == Entry Meta ==
/// Immutable snapshot of an entry's metadata.
///
/// Timestamps come from the store's clock in milliseconds. The two sequence
/// numbers come from a store-wide counter: `created_seq` is unique per entry
/// incarnation, `accessed_seq` orders accesses that share a clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    /// Time of the fresh insert
    pub created_at: u64,
    /// Time of the last write (fresh insert or replacement)
    pub updated_at: u64,
    /// Time of the last read hit or write
    pub last_accessed_at: u64,
    /// Number of read hits since the fresh insert
    pub access_count: u64,
    /// Insertion sequence, a total order over live entries
    pub created_seq: u64,
    /// Sequence of the last read hit or write
    pub accessed_seq: u64,
}

impl EntryMeta {
    // == Recency ==
    /// Ordering key for least-recently-used selection: oldest access first,
    /// then oldest creation, then insertion sequence.
    pub fn recency(&self) -> (u64, u64, u64, u64) {
        (
            self.last_accessed_at,
            self.accessed_seq,
            self.created_at,
            self.created_seq,
        )
    }
}

// == Entry ==
/// A stored value with its access metadata.
///
/// Access fields are atomics so read hits can refresh them while holding only
/// a shared lock on the owning shard.
#[derive(Debug)]
pub struct Entry<V> {
    value: V,
    created_at: u64,
    created_seq: u64,
    updated_at: u64,
    last_accessed_at: AtomicU64,
    accessed_seq: AtomicU64,
    access_count: AtomicU64,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates a fresh entry written at `now` with sequence `seq`.
    pub fn new(value: V, now: u64, seq: u64) -> Self {
        Self {
            value,
            created_at: now,
            created_seq: seq,
            updated_at: now,
            last_accessed_at: AtomicU64::new(now),
            accessed_seq: AtomicU64::new(seq),
            access_count: AtomicU64::new(0),
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    /// Insertion sequence of this incarnation of the key.
    pub fn created_seq(&self) -> u64 {
        self.created_seq
    }

    // == Touch ==
    /// Records a read hit at `now`.
    ///
    /// Concurrent touches may race; `fetch_max` keeps both fields monotonic so
    /// a late-arriving older touch never rewinds recency.
    pub fn touch(&self, now: u64, seq: u64) {
        self.last_accessed_at.fetch_max(now, Ordering::AcqRel);
        self.accessed_seq.fetch_max(seq, Ordering::AcqRel);
        self.access_count.fetch_add(1, Ordering::AcqRel);
    }

    // == Update ==
    /// Replaces the value in place, returning the previous one.
    ///
    /// Creation time, insertion sequence and access count are preserved.
    pub fn update(&mut self, value: V, now: u64, seq: u64) -> V {
        self.updated_at = now;
        *self.last_accessed_at.get_mut() = now;
        *self.accessed_seq.get_mut() = seq;
        std::mem::replace(&mut self.value, value)
    }

    // == Meta ==
    /// Takes a snapshot of the metadata.
    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_accessed_at: self.last_accessed_at.load(Ordering::Acquire),
            access_count: self.access_count.load(Ordering::Acquire),
            created_seq: self.created_seq,
            accessed_seq: self.accessed_seq.load(Ordering::Acquire),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = Entry::new("value".to_string(), 100, 7);
        let meta = entry.meta();

        assert_eq!(entry.value(), "value");
        assert_eq!(meta.created_at, 100);
        assert_eq!(meta.updated_at, 100);
        assert_eq!(meta.last_accessed_at, 100);
        assert_eq!(meta.access_count, 0);
        assert_eq!(meta.created_seq, 7);
        assert_eq!(meta.accessed_seq, 7);
    }

    #[test]
    fn test_touch_refreshes_access() {
        let entry = Entry::new(1u32, 100, 1);
        entry.touch(150, 5);
        entry.touch(160, 6);

        let meta = entry.meta();
        assert_eq!(meta.last_accessed_at, 160);
        assert_eq!(meta.accessed_seq, 6);
        assert_eq!(meta.access_count, 2);
        // Writes are not reads
        assert_eq!(meta.updated_at, 100);
    }

    #[test]
    fn test_touch_never_rewinds() {
        let entry = Entry::new(1u32, 100, 1);
        entry.touch(200, 9);
        entry.touch(150, 4);

        let meta = entry.meta();
        assert_eq!(meta.last_accessed_at, 200);
        assert_eq!(meta.accessed_seq, 9);
        assert_eq!(meta.access_count, 2);
    }

    #[test]
    fn test_update_keeps_creation() {
        let mut entry = Entry::new("old".to_string(), 100, 1);
        entry.touch(120, 2);

        let previous = entry.update("new".to_string(), 130, 3);
        let meta = entry.meta();

        assert_eq!(previous, "old");
        assert_eq!(entry.value(), "new");
        assert_eq!(meta.created_at, 100);
        assert_eq!(meta.created_seq, 1);
        assert_eq!(meta.updated_at, 130);
        assert_eq!(meta.last_accessed_at, 130);
        assert_eq!(meta.accessed_seq, 3);
        assert_eq!(meta.access_count, 1);
    }

    #[test]
    fn test_recency_orders_by_access_then_sequence() {
        let a = Entry::new((), 10, 1).meta();
        let b = Entry::new((), 10, 2).meta();
        let c = Entry::new((), 9, 3).meta();

        assert!(a.recency() < b.recency());
        assert!(c.recency() < a.recency());
    }
}
