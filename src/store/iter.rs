//! Weakly consistent iteration over an [`OnHeapStore`].

use std::vec;

use crate::store::{OnHeapStore, StoreKey, StoreValue};

// == Store Iterator ==
/// Walks the store one shard at a time.
///
/// Each shard is cloned under its read lock when the iterator reaches it, so
/// writers are blocked for at most one shard copy. A key always lives in the
/// same shard, which is why no key can be produced twice. Entries already
/// expired when the iterator was created are skipped.
pub struct StoreIter<'a, K, V> {
    store: &'a OnHeapStore<K, V>,
    next_shard: usize,
    now: u64,
    buffer: vec::IntoIter<(K, V)>,
}

impl<'a, K: StoreKey, V: StoreValue> StoreIter<'a, K, V> {
    pub(crate) fn new(store: &'a OnHeapStore<K, V>) -> Self {
        Self {
            store,
            next_shard: 0,
            now: store.clock_now(),
            buffer: Vec::new().into_iter(),
        }
    }
}

impl<K: StoreKey, V: StoreValue> Iterator for StoreIter<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(item);
            }
            let entries = self.store.live_entries(self.next_shard, self.now)?;
            self.next_shard += 1;
            self.buffer = entries.into_iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::StoreConfig;
    use crate::store::{OnHeapStore, Store};
    use std::collections::HashSet;

    #[test]
    fn test_iter_visits_every_shard_once() {
        let store: OnHeapStore<u32, String> =
            OnHeapStore::new(StoreConfig::new(256).with_shards(8)).unwrap();
        for i in 0..200 {
            store.put(i, format!("v{}", i)).unwrap();
        }

        let seen: Vec<(u32, String)> = store.iter().unwrap().collect();
        let unique: HashSet<u32> = seen.iter().map(|(k, _)| *k).collect();

        assert_eq!(seen.len(), 200);
        assert_eq!(unique.len(), 200);
        assert!(seen.iter().all(|(k, v)| *v == format!("v{}", k)));
    }

    #[test]
    fn test_iter_is_restartable() {
        let store: OnHeapStore<u32, u32> = OnHeapStore::new(StoreConfig::new(16)).unwrap();
        for i in 0..10 {
            store.put(i, i * 2).unwrap();
        }

        let first: HashSet<(u32, u32)> = store.iter().unwrap().collect();
        let second: HashSet<(u32, u32)> = store.iter().unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 10);
    }

    #[test]
    fn test_iter_tolerates_mutation_midway() {
        let store: OnHeapStore<u32, u32> =
            OnHeapStore::new(StoreConfig::new(64).with_shards(4)).unwrap();
        for i in 0..32 {
            store.put(i, i).unwrap();
        }

        let mut iter = store.iter().unwrap();
        let first = iter.next().unwrap();
        for i in 32..64 {
            store.put(i, i).unwrap();
        }
        store.remove(&first.0).unwrap();

        let mut seen = HashSet::from([first.0]);
        for (k, v) in iter {
            assert_eq!(k, v);
            assert!(seen.insert(k), "key {} produced twice", k);
        }
    }
}
