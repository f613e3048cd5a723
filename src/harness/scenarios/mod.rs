//! The conformance battery.
//!
//! Every scenario builds its own store through the factory, so scenarios never
//! observe each other's state.

mod capacity;
mod concurrency;
mod conditional;
mod crud;
mod expiry;
mod iteration;

use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::{Clock, ManualClock};
use crate::config::StoreConfig;
use crate::store::{Store, StoreFactory, StoreKey, StoreValue};

/// A named conformance check.
pub struct Scenario<F> {
    pub name: &'static str,
    pub(super) check: fn(&F) -> anyhow::Result<()>,
}

impl<F> Scenario<F> {
    fn new(name: &'static str, check: fn(&F) -> anyhow::Result<()>) -> Self {
        Self { name, check }
    }
}

/// Every scenario, in execution order.
pub(super) fn all<F: StoreFactory>() -> Vec<Scenario<F>> {
    vec![
        Scenario::new("crud/put_get", crud::put_get::<F>),
        Scenario::new("crud/overwrite", crud::overwrite::<F>),
        Scenario::new("crud/remove", crud::remove::<F>),
        Scenario::new("crud/clear", crud::clear::<F>),
        Scenario::new("capacity/lru_model", capacity::lru_model::<F>),
        Scenario::new("capacity/lfu_model", capacity::lfu_model::<F>),
        Scenario::new("capacity/fifo_model", capacity::fifo_model::<F>),
        Scenario::new("capacity/read_protects_entry", capacity::read_protects_entry::<F>),
        Scenario::new(
            "capacity/overwrite_keeps_population",
            capacity::overwrite_keeps_population::<F>,
        ),
        Scenario::new("capacity/zero", capacity::zero::<F>),
        Scenario::new("expiry/time_to_live", expiry::time_to_live::<F>),
        Scenario::new("expiry/time_to_idle", expiry::time_to_idle::<F>),
        Scenario::new("expiry/expired_evicted_first", expiry::expired_evicted_first::<F>),
        Scenario::new("expiry/write_over_expired", expiry::write_over_expired::<F>),
        Scenario::new("expiry/write_over_idle", expiry::write_over_idle::<F>),
        Scenario::new("conditional/put_if_absent", conditional::put_if_absent::<F>),
        Scenario::new("conditional/replace", conditional::replace::<F>),
        Scenario::new("conditional/replace_if_equal", conditional::replace_if_equal::<F>),
        Scenario::new("conditional/remove_if_equal", conditional::remove_if_equal::<F>),
        Scenario::new("concurrency/mixed_linearizable", concurrency::mixed_linearizable::<F>),
        Scenario::new(
            "concurrency/put_if_absent_single_winner",
            concurrency::put_if_absent_single_winner::<F>,
        ),
        Scenario::new(
            "concurrency/compare_and_swap_counter",
            concurrency::compare_and_swap_counter::<F>,
        ),
        Scenario::new("concurrency/eviction_pressure", concurrency::eviction_pressure::<F>),
        Scenario::new("iteration/restartable", iteration::restartable::<F>),
        Scenario::new(
            "iteration/consistent_under_mutation",
            iteration::consistent_under_mutation::<F>,
        ),
    ]
}

// == Fixture ==
/// A fresh store driven by a logical clock starting at zero.
pub(super) struct Fixture<K, V> {
    pub store: Arc<dyn Store<K, V>>,
    pub clock: Arc<ManualClock>,
}

impl<K: StoreKey, V: StoreValue> Fixture<K, V> {
    pub fn new<F: StoreFactory>(factory: &F, config: StoreConfig) -> anyhow::Result<Self> {
        let clock = Arc::new(ManualClock::new(0));
        let store = factory.new_store(config.with_clock(clock.clone()))?;
        verify_eq!(store.len(), 0, "new store length");
        Ok(Self { store, clock })
    }

    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Keys produced by a full iteration, failing on duplicates.
    pub fn keys(&self) -> anyhow::Result<HashSet<K>> {
        let mut keys = HashSet::new();
        for (key, _) in self.store.iter()? {
            verify!(keys.insert(key.clone()), "iteration produced {:?} twice", key);
        }
        Ok(keys)
    }
}

pub(super) fn key(i: usize) -> String {
    format!("k{}", i)
}

pub(super) fn value(i: usize) -> String {
    format!("v{}", i)
}
