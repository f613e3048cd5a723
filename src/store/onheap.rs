//! On-Heap Store Module
//!
//! Sharded concurrent map combining entry storage with eviction and expiry
//! policies.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::store::stats::StatsRecorder;
use crate::store::{
    Entry, EntryMeta, EvictionPolicy, ExpiryPolicy, RemovalCause, Store, StoreEventListener,
    StoreIter, StoreKey, StoreStats, StoreValue,
};

// == Shard ==
/// Cache-line aligned so neighbouring shard locks do not false-share.
#[repr(align(64))]
struct Shard<K, V> {
    map: RwLock<AHashMap<K, Entry<V>>>,
}

// == On-Heap Store ==
/// A thread-safe, capacity-bounded store backed by independently locked
/// shards.
///
/// Capacity is accounted for with an atomic slot counter. A fresh insert
/// reserves a slot inside its shard's write lock and publishes the entry in
/// the same critical section; removals release the slot after the entry is
/// gone. `len()` reads the counter, so it never exceeds capacity. When no
/// slot is free the inserter drops its lock, evicts one victim and retries.
/// No code path holds two shard locks at once.
pub struct OnHeapStore<K, V> {
    shards: Box<[Shard<K, V>]>,
    /// Always `shards.len() - 1`; shards.len() is a power of two.
    shard_mask: usize,
    build_hasher: RandomState,
    capacity: usize,
    occupied: AtomicUsize,
    sequence: AtomicU64,
    eviction: EvictionPolicy,
    expiry: ExpiryPolicy,
    clock: Arc<dyn Clock>,
    listener: Option<Arc<dyn StoreEventListener<K, V>>>,
    stats: StatsRecorder,
}

impl<K: StoreKey, V: StoreValue> OnHeapStore<K, V> {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// The shard count is rounded up to the next power of two.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let shard_count = config.shards.next_power_of_two();
        let shards = (0..shard_count)
            .map(|_| Shard {
                map: RwLock::new(AHashMap::new()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        info!(
            "On-heap store created: capacity={}, shards={}, eviction={}",
            config.capacity, shard_count, config.eviction
        );

        Ok(Self {
            shards,
            shard_mask: shard_count - 1,
            build_hasher: RandomState::new(),
            capacity: config.capacity,
            occupied: AtomicUsize::new(0),
            sequence: AtomicU64::new(0),
            eviction: config.eviction,
            expiry: config.expiry,
            clock: config.clock,
            listener: None,
            stats: StatsRecorder::default(),
        })
    }

    /// Registers the listener notified of evictions and expirations.
    pub fn with_listener(mut self, listener: Arc<dyn StoreEventListener<K, V>>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.eviction
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.expiry
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> StoreStats {
        self.stats.snapshot(self.len())
    }

    // == Reap Expired ==
    /// Removes every entry that is expired for read.
    ///
    /// Returns the number of entries removed.
    pub fn reap_expired(&self) -> usize {
        if self.expiry.is_eternal() {
            return 0;
        }

        let now = self.now();
        let mut reaped = Vec::new();
        for shard in self.shards.iter() {
            let mut map = shard.map.write();
            let expired: Vec<K> = map
                .iter()
                .filter(|(_, entry)| self.expiry.is_expired_for_read(&entry.meta(), now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in expired {
                if let Some((key, entry)) = map.remove_entry(&key) {
                    self.release_slots(1);
                    reaped.push((key, entry.into_value()));
                }
            }
        }

        let count = reaped.len();
        for (key, value) in reaped {
            self.record_removal(&key, &value, RemovalCause::Expired);
        }
        count
    }

    // == Internals ==
    fn shard_for(&self, key: &K) -> &Shard<K, V> {
        let h = self.build_hasher.hash_one(key);
        // High bits avalanche better with ahash.
        &self.shards[((h >> 32) as usize) & self.shard_mask]
    }

    fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Claims one unit of capacity if any is left.
    fn reserve_slot(&self) -> bool {
        self.occupied
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            })
            .is_ok()
    }

    fn release_slots(&self, n: usize) {
        self.occupied.fetch_sub(n, Ordering::AcqRel);
    }

    /// Removes `key` from a locked shard map if it is expired for read.
    fn take_if_expired(
        &self,
        map: &mut AHashMap<K, Entry<V>>,
        key: &K,
        now: u64,
    ) -> Option<(K, V)> {
        let expired = map
            .get(key)
            .is_some_and(|entry| self.expiry.is_expired_for_read(&entry.meta(), now));
        if !expired {
            return None;
        }
        let (key, entry) = map.remove_entry(key)?;
        self.release_slots(1);
        Some((key, entry.into_value()))
    }

    /// Counts and announces a removal. Callers must not hold a shard lock.
    fn record_removal(&self, key: &K, value: &V, cause: RemovalCause) {
        match cause {
            RemovalCause::Capacity => {
                self.stats.record_eviction();
                debug!("Evicted {:?} to stay within capacity {}", key, self.capacity);
            }
            RemovalCause::Expired => {
                self.stats.record_expiration();
                debug!("Expired {:?}", key);
            }
        }
        if let Some(listener) = &self.listener {
            listener.on_removal(key, value, cause);
        }
    }

    // == Eviction ==
    /// Frees one slot, or yields when the victim scan raced with concurrent
    /// removals and came back empty.
    fn make_room(&self) {
        if !self.evict_one() {
            std::thread::yield_now();
        }
    }

    /// Evicts one victim. Returns false when no candidate was found.
    ///
    /// The victim is only removed if the same incarnation is still present;
    /// if it was replaced or removed meanwhile the caller just retries.
    fn evict_one(&self) -> bool {
        let now = self.now();
        let Some((victim, meta, cause)) = self.select_victim(now) else {
            return false;
        };

        let removed = {
            let mut map = self.shard_for(&victim).map.write();
            let current = map
                .get(&victim)
                .is_some_and(|entry| entry.created_seq() == meta.created_seq);
            if current {
                map.remove_entry(&victim).map(|(key, entry)| {
                    self.release_slots(1);
                    (key, entry.into_value())
                })
            } else {
                None
            }
        };

        if let Some((key, value)) = removed {
            self.record_removal(&key, &value, cause);
        }
        true
    }

    /// Picks the store-wide victim: expired entries first, then the eviction
    /// policy's choice among live ones.
    ///
    /// Each shard contributes its own best candidate; every policy ordering is
    /// total, so the best of those is the best overall.
    fn select_victim(&self, now: u64) -> Option<(K, EntryMeta, RemovalCause)> {
        let mut expired_pool: Vec<(K, EntryMeta)> = Vec::new();
        let mut live_pool: Vec<(K, EntryMeta)> = Vec::new();

        for shard in self.shards.iter() {
            let map = shard.map.read();
            let (expired, live): (Vec<(&K, EntryMeta)>, Vec<(&K, EntryMeta)>) = map
                .iter()
                .map(|(key, entry)| (key, entry.meta()))
                .partition(|(_, meta)| self.expiry.is_expired_for_read(meta, now));

            if let Some((key, meta)) = self.eviction.select_victim(&expired) {
                expired_pool.push((K::clone(key), *meta));
            } else if expired_pool.is_empty() {
                if let Some((key, meta)) = self.eviction.select_victim(&live) {
                    live_pool.push((K::clone(key), *meta));
                }
            }
        }

        if let Some((key, meta)) = self.eviction.select_victim(&expired_pool) {
            return Some((key.clone(), *meta, RemovalCause::Expired));
        }
        self.eviction
            .select_victim(&live_pool)
            .map(|(key, meta)| (key.clone(), *meta, RemovalCause::Capacity))
    }

    // == Iteration Support ==
    /// Clones the live entries of one shard, or None past the last shard.
    pub(crate) fn live_entries(&self, shard: usize, now: u64) -> Option<Vec<(K, V)>> {
        let shard = self.shards.get(shard)?;
        let map = shard.map.read();
        Some(
            map.iter()
                .filter(|(_, entry)| !self.expiry.is_expired_for_read(&entry.meta(), now))
                .map(|(key, entry)| (key.clone(), entry.value().clone()))
                .collect(),
        )
    }

    pub(crate) fn clock_now(&self) -> u64 {
        self.now()
    }
}

impl<K: StoreKey, V: StoreValue> Store<K, V> for OnHeapStore<K, V> {
    // == Get ==
    fn get(&self, key: &K) -> Result<Option<V>> {
        let now = self.now();
        let shard = self.shard_for(key);
        {
            let map = shard.map.read();
            match map.get(key) {
                None => {
                    self.stats.record_miss();
                    return Ok(None);
                }
                Some(entry) if !self.expiry.is_expired_for_read(&entry.meta(), now) => {
                    entry.touch(now, self.next_seq());
                    self.stats.record_hit();
                    return Ok(Some(entry.value().clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: upgrade to a write lock and remove it if nobody beat us to it
        let expired = self.take_if_expired(&mut shard.map.write(), key, now);
        if let Some((key, value)) = expired {
            self.record_removal(&key, &value, RemovalCause::Expired);
        }
        self.stats.record_miss();
        Ok(None)
    }

    // == Put ==
    fn put(&self, key: K, value: V) -> Result<()> {
        if self.capacity == 0 {
            // Admitted and immediately evicted
            self.record_removal(&key, &value, RemovalCause::Capacity);
            return Ok(());
        }

        let shard = self.shard_for(&key);
        loop {
            let now = self.now();
            let mut map = shard.map.write();

            if let Some(entry) = map.get_mut(&key) {
                if self.expiry.is_expired_for_read(&entry.meta(), now) {
                    // Replaced as a fresh insert; the slot carries over
                    let stale = std::mem::replace(entry, Entry::new(value, now, self.next_seq()));
                    drop(map);
                    self.record_removal(&key, stale.value(), RemovalCause::Expired);
                } else {
                    entry.update(value, now, self.next_seq());
                }
                return Ok(());
            }

            if self.reserve_slot() {
                map.insert(key, Entry::new(value, now, self.next_seq()));
                return Ok(());
            }

            drop(map);
            self.make_room();
        }
    }

    // == Put If Absent ==
    fn put_if_absent(&self, key: K, value: V) -> Result<Option<V>> {
        let shard = self.shard_for(&key);
        loop {
            let now = self.now();
            let mut map = shard.map.write();

            if let Some(entry) = map.get_mut(&key) {
                if !self.expiry.is_expired_for_read(&entry.meta(), now) {
                    return Ok(Some(entry.value().clone()));
                }
                let stale = std::mem::replace(entry, Entry::new(value, now, self.next_seq()));
                drop(map);
                self.record_removal(&key, stale.value(), RemovalCause::Expired);
                return Ok(None);
            }

            if self.capacity == 0 {
                drop(map);
                self.record_removal(&key, &value, RemovalCause::Capacity);
                return Ok(None);
            }

            if self.reserve_slot() {
                map.insert(key, Entry::new(value, now, self.next_seq()));
                return Ok(None);
            }

            drop(map);
            self.make_room();
        }
    }

    // == Remove ==
    fn remove(&self, key: &K) -> Result<Option<V>> {
        let now = self.now();
        let removed = {
            let mut map = self.shard_for(key).map.write();
            map.remove_entry(key).map(|(key, entry)| {
                self.release_slots(1);
                (key, entry)
            })
        };

        match removed {
            Some((key, entry)) if self.expiry.is_expired_for_read(&entry.meta(), now) => {
                self.record_removal(&key, entry.value(), RemovalCause::Expired);
                Ok(None)
            }
            Some((_, entry)) => Ok(Some(entry.into_value())),
            None => Ok(None),
        }
    }

    fn remove_if_equal(&self, key: &K, expected: &V) -> Result<bool> {
        let now = self.now();
        let mut map = self.shard_for(key).map.write();

        if let Some((key, value)) = self.take_if_expired(&mut map, key, now) {
            drop(map);
            self.record_removal(&key, &value, RemovalCause::Expired);
            return Ok(false);
        }

        let matches = map.get(key).is_some_and(|entry| entry.value() == expected);
        if matches {
            map.remove(key);
            self.release_slots(1);
        }
        Ok(matches)
    }

    // == Replace ==
    fn replace(&self, key: &K, value: V) -> Result<Option<V>> {
        let now = self.now();
        let mut map = self.shard_for(key).map.write();

        if let Some((key, stale)) = self.take_if_expired(&mut map, key, now) {
            drop(map);
            self.record_removal(&key, &stale, RemovalCause::Expired);
            return Ok(None);
        }

        Ok(map
            .get_mut(key)
            .map(|entry| entry.update(value, now, self.next_seq())))
    }

    fn replace_if_equal(&self, key: &K, expected: &V, value: V) -> Result<bool> {
        let now = self.now();
        let mut map = self.shard_for(key).map.write();

        if let Some((key, stale)) = self.take_if_expired(&mut map, key, now) {
            drop(map);
            self.record_removal(&key, &stale, RemovalCause::Expired);
            return Ok(false);
        }

        match map.get_mut(key) {
            Some(entry) if entry.value() == expected => {
                entry.update(value, now, self.next_seq());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn contains_key(&self, key: &K) -> Result<bool> {
        let now = self.now();
        let shard = self.shard_for(key);
        let live = match shard.map.read().get(key) {
            None => return Ok(false),
            Some(entry) => !self.expiry.is_expired_for_read(&entry.meta(), now),
        };
        if live {
            return Ok(true);
        }

        let expired = self.take_if_expired(&mut shard.map.write(), key, now);
        if let Some((key, value)) = expired {
            self.record_removal(&key, &value, RemovalCause::Expired);
        }
        Ok(false)
    }

    fn iter(&self) -> Result<Box<dyn Iterator<Item = (K, V)> + '_>> {
        Ok(Box::new(StoreIter::new(self)))
    }

    // == Clear ==
    fn clear(&self) -> Result<()> {
        let mut cleared = 0;
        for shard in self.shards.iter() {
            let mut map = shard.map.write();
            let count = map.len();
            map.clear();
            self.release_slots(count);
            cleared += count;
        }
        debug!("Cleared {} entries", cleared);
        Ok(())
    }

    // == Length ==
    fn len(&self) -> usize {
        self.occupied.load(Ordering::Acquire)
    }
}

impl<K, V> fmt::Debug for OnHeapStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnHeapStore")
            .field("capacity", &self.capacity)
            .field("len", &self.occupied.load(Ordering::Relaxed))
            .field("shards", &self.shards.len())
            .field("eviction", &self.eviction)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}
