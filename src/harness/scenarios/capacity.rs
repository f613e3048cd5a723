//! Capacity enforcement and victim selection.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{key, value, Fixture};
use crate::config::StoreConfig;
use crate::harness::ReferenceModel;
use crate::store::{EvictionPolicy, ExpiryPolicy, StoreFactory};

const MODEL_CAPACITY: usize = 8;
const MODEL_KEYS: usize = 24;
const MODEL_OPS: usize = 2000;

pub fn lru_model<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    against_model(factory, EvictionPolicy::Lru, 0x1e5)
}

pub fn lfu_model<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    against_model(factory, EvictionPolicy::Lfu, 0x1f5)
}

pub fn fifo_model<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    against_model(factory, EvictionPolicy::Fifo, 0xf1f0)
}

/// Replays a seeded random workload against the store and the reference
/// model, advancing the clock one tick per operation so every access has a
/// distinct timestamp. After each step the surviving keys must agree.
fn against_model<F: StoreFactory>(
    factory: &F,
    eviction: EvictionPolicy,
    seed: u64,
) -> anyhow::Result<()> {
    let config = StoreConfig::new(MODEL_CAPACITY).with_eviction(eviction);
    let fx = Fixture::<String, String>::new(factory, config)?;
    let store = &fx.store;
    let mut model = ReferenceModel::new(MODEL_CAPACITY, eviction, ExpiryPolicy::eternal());
    let mut rng = StdRng::seed_from_u64(seed);

    for step in 0..MODEL_OPS {
        fx.clock.tick(1);
        let now = fx.now();
        let i = rng.random_range(0..MODEL_KEYS);

        match rng.random_range(0..10) {
            0..=4 => {
                let expected = model.get(&key(i), now);
                verify_eq!(
                    store.get(&key(i))?,
                    expected,
                    "step {}: {} get({})",
                    step,
                    eviction,
                    key(i)
                );
            }
            5..=8 => {
                model.put(key(i), value(step), now);
                store.put(key(i), value(step))?;
            }
            _ => {
                let expected = model.remove(&key(i), now);
                verify_eq!(
                    store.remove(&key(i))?,
                    expected,
                    "step {}: {} remove({})",
                    step,
                    eviction,
                    key(i)
                );
            }
        }

        verify!(
            store.len() <= MODEL_CAPACITY,
            "step {}: length {} exceeds capacity {}",
            step,
            store.len(),
            MODEL_CAPACITY
        );
        verify_eq!(fx.keys()?, model.live_keys(now), "step {}: {} surviving keys", step, eviction);
    }
    Ok(())
}

/// A,B,C into capacity 2 leaves {B,C}; reading B then inserting D leaves
/// {B,D}. The clock never moves, so recency must come from access order.
pub fn read_protects_entry<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let config = StoreConfig::new(2).with_eviction(EvictionPolicy::Lru);
    let fx = Fixture::<String, String>::new(factory, config)?;
    let store = &fx.store;
    let (a, b, c, d) = ("A".to_string(), "B".to_string(), "C".to_string(), "D".to_string());

    store.put(a, "1".to_string())?;
    store.put(b.clone(), "2".to_string())?;
    store.put(c.clone(), "3".to_string())?;
    verify_eq!(fx.keys()?, HashSet::from([b.clone(), c.clone()]), "survivors after A,B,C");

    verify_eq!(store.get(&b)?, Some("2".to_string()), "get(B)");
    store.put(d.clone(), "4".to_string())?;
    verify_eq!(fx.keys()?, HashSet::from([b, d]), "survivors after get(B), D");
    verify_eq!(store.len(), 2, "length at capacity");
    Ok(())
}

pub fn overwrite_keeps_population<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(3))?;
    let store = &fx.store;

    for i in 0..3 {
        store.put(key(i), value(i))?;
    }
    for round in 0..5 {
        for i in 0..3 {
            store.put(key(i), value(round * 10 + i))?;
        }
    }

    verify_eq!(
        fx.keys()?,
        (0..3).map(key).collect::<HashSet<_>>(),
        "overwrites at capacity evicted a key"
    );
    verify_eq!(store.get(&key(2))?, Some(value(42)), "latest overwrite");
    Ok(())
}

/// A zero-capacity store admits nothing.
pub fn zero<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(0))?;
    let store = &fx.store;

    store.put(key(1), value(1))?;
    verify_eq!(store.get(&key(1))?, None, "get from zero-capacity store");
    verify_eq!(
        store.put_if_absent(key(2), value(2))?,
        None,
        "put_if_absent on zero-capacity store"
    );
    verify!(!store.contains_key(&key(2))?, "zero-capacity store retained {}", key(2));
    verify_eq!(store.len(), 0, "length of zero-capacity store");
    verify!(fx.keys()?.is_empty(), "zero-capacity store iterated entries");
    Ok(())
}
