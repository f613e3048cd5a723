//! Reference Model Module
//!
//! A single-threaded model of the store contract. The conformance scenarios
//! replay the same operations against it to predict which keys a correct
//! store keeps.

use std::collections::{HashMap, HashSet};

use crate::config::StoreConfig;
use crate::store::{Entry, EntryMeta, EvictionPolicy, ExpiryPolicy, StoreKey, StoreValue};

// == Reference Model ==
/// Sequential store with the same eviction and expiry rules as the contract.
#[derive(Debug)]
pub struct ReferenceModel<K, V> {
    capacity: usize,
    eviction: EvictionPolicy,
    expiry: ExpiryPolicy,
    entries: HashMap<K, Entry<V>>,
    sequence: u64,
}

impl<K: StoreKey, V: StoreValue> ReferenceModel<K, V> {
    pub fn new(capacity: usize, eviction: EvictionPolicy, expiry: ExpiryPolicy) -> Self {
        Self {
            capacity,
            eviction,
            expiry,
            entries: HashMap::new(),
            sequence: 0,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.capacity, config.eviction, config.expiry)
    }

    fn next_seq(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    // == Get ==
    pub fn get(&mut self, key: &K, now: u64) -> Option<V> {
        if self.expire(key, now) {
            return None;
        }
        let seq = self.next_seq();
        let entry = self.entries.get(key)?;
        entry.touch(now, seq);
        Some(entry.value().clone())
    }

    // == Put ==
    /// Applies a put and returns the key evicted to make room, if any.
    ///
    /// With zero capacity the inserted key itself is reported as evicted.
    pub fn put(&mut self, key: K, value: V, now: u64) -> Option<K> {
        if self.capacity == 0 {
            return Some(key);
        }

        let seq = self.next_seq();
        if let Some(entry) = self.entries.get_mut(&key) {
            if self.expiry.is_expired_for_read(&entry.meta(), now) {
                *entry = Entry::new(value, now, seq);
            } else {
                entry.update(value, now, seq);
            }
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.evict(now)
        } else {
            None
        };
        self.entries.insert(key, Entry::new(value, now, seq));
        evicted
    }

    // == Remove ==
    pub fn remove(&mut self, key: &K, now: u64) -> Option<V> {
        if self.expire(key, now) {
            return None;
        }
        self.entries.remove(key).map(Entry::into_value)
    }

    /// Keys a correct store would report as live at `now`.
    pub fn live_keys(&self, now: u64) -> HashSet<K> {
        self.entries
            .iter()
            .filter(|(_, entry)| !self.expiry.is_expired_for_read(&entry.meta(), now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expire(&mut self, key: &K, now: u64) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| self.expiry.is_expired_for_read(&entry.meta(), now));
        if expired {
            self.entries.remove(key);
        }
        expired
    }

    fn evict(&mut self, now: u64) -> Option<K> {
        let (expired, live): (Vec<(K, EntryMeta)>, Vec<(K, EntryMeta)>) = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.meta()))
            .partition(|(_, meta)| self.expiry.is_expired_for_read(meta, now));

        let pool = if expired.is_empty() { &live } else { &expired };
        let (victim, _) = self.eviction.select_victim(pool)?;
        let victim = victim.clone();
        self.entries.remove(&victim);
        Some(victim)
    }
}
