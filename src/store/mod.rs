//! Store Module
//!
//! The store contract, its on-heap implementation and the policies it is
//! built from.

mod entry;
mod eviction;
mod expiry;
mod iter;
mod listener;
mod onheap;
mod stats;


use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;

// Re-export public types
pub use entry::{Entry, EntryMeta};
pub use eviction::EvictionPolicy;
pub use expiry::ExpiryPolicy;
pub use iter::StoreIter;
pub use listener::{FnListener, RemovalCause, StoreEventListener};
pub use onheap::OnHeapStore;
pub use stats::StoreStats;

// == Key And Value Bounds ==
/// Requirements on store keys. Key identity is `Eq` + `Hash`.
pub trait StoreKey: Eq + Hash + Clone + Send + Sync + Debug + 'static {}

impl<T> StoreKey for T where T: Eq + Hash + Clone + Send + Sync + Debug + 'static {}

/// Requirements on store values. Conditional operations compare with
/// `PartialEq`; reads hand out clones.
pub trait StoreValue: Clone + PartialEq + Send + Sync + Debug + 'static {}

impl<T> StoreValue for T where T: Clone + PartialEq + Send + Sync + Debug + 'static {}

// == Store ==
/// A concurrent, capacity-bounded key/value store.
///
/// Absence is never an error. `Err` is reserved for an implementation that
/// cannot service the call at all.
pub trait Store<K, V>: Send + Sync {
    /// Returns the value of a live, unexpired entry.
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Inserts or replaces the entry for `key`, evicting if full.
    fn put(&self, key: K, value: V) -> Result<()>;

    /// Inserts only if no live entry exists. Returns the existing value
    /// otherwise, leaving it untouched.
    fn put_if_absent(&self, key: K, value: V) -> Result<Option<V>>;

    /// Removes the entry, returning its value.
    fn remove(&self, key: &K) -> Result<Option<V>>;

    /// Removes the entry only if its value equals `expected`.
    fn remove_if_equal(&self, key: &K, expected: &V) -> Result<bool>;

    /// Replaces the value of a live entry, returning the previous value.
    fn replace(&self, key: &K, value: V) -> Result<Option<V>>;

    /// Replaces the value only if it currently equals `expected`.
    fn replace_if_equal(&self, key: &K, expected: &V, value: V) -> Result<bool>;

    fn contains_key(&self, key: &K) -> Result<bool>;

    /// Iterates live entries. Weakly consistent: concurrent mutations may or
    /// may not be observed, but no key is produced twice.
    fn iter(&self) -> Result<Box<dyn Iterator<Item = (K, V)> + '_>>;

    fn clear(&self) -> Result<()>;

    /// Number of entries held against capacity.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Store Factory ==
/// Builds stores from resolved configuration.
///
/// This is the only surface the conformance tester needs from an
/// implementation.
pub trait StoreFactory: Send + Sync {
    fn new_store<K: StoreKey, V: StoreValue>(
        &self,
        config: StoreConfig,
    ) -> Result<Arc<dyn Store<K, V>>>;
}

// == On-Heap Store Factory ==
/// Factory for [`OnHeapStore`].
///
/// A fixed shard count, when set, overrides the one in each configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnHeapStoreFactory {
    shards: Option<usize>,
}

impl OnHeapStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: Some(shards),
        }
    }
}

impl StoreFactory for OnHeapStoreFactory {
    fn new_store<K: StoreKey, V: StoreValue>(
        &self,
        config: StoreConfig,
    ) -> Result<Arc<dyn Store<K, V>>> {
        let config = match self.shards {
            Some(shards) => config.with_shards(shards),
            None => config,
        };
        Ok(Arc::new(OnHeapStore::new(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_factory_builds_empty_store() {
        let store: Arc<dyn Store<String, u64>> =
            OnHeapStoreFactory::new().new_store(StoreConfig::new(4)).unwrap();

        assert!(store.is_empty());
        store.put("a".to_string(), 1).unwrap();
        assert_eq!(store.get(&"a".to_string()).unwrap(), Some(1));
    }

    #[test]
    fn test_factory_shard_override_is_validated() {
        let result: Result<Arc<dyn Store<u64, u64>>> =
            OnHeapStoreFactory::with_shards(0).new_store(StoreConfig::new(4));

        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
    }
}
