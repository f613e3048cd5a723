//! Time-to-live and time-to-idle expiry, driven by the logical clock.

use std::collections::HashSet;
use std::time::Duration;

use super::{key, value, Fixture};
use crate::config::StoreConfig;
use crate::store::{EvictionPolicy, ExpiryPolicy, StoreFactory};

fn ttl(millis: u64) -> ExpiryPolicy {
    ExpiryPolicy::time_to_live(Duration::from_millis(millis))
}

pub fn time_to_live<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16).with_expiry(ttl(10)))?;
    let store = &fx.store;

    store.put(key(1), value(1))?;
    fx.clock.set(5);
    store.put(key(2), value(2))?;

    // Reads do not extend a time-to-live
    verify_eq!(store.get(&key(1))?, Some(value(1)), "get {} at t=5", key(1));
    fx.clock.set(9);
    verify_eq!(store.get(&key(1))?, Some(value(1)), "get {} at t=9", key(1));

    fx.clock.set(11);
    verify_eq!(store.get(&key(1))?, None, "get {} written at t=0 with ttl 10 at t=11", key(1));
    verify!(!store.contains_key(&key(1))?, "contains_key on expired {}", key(1));
    verify_eq!(fx.keys()?, HashSet::from([key(2)]), "live keys at t=11");

    fx.clock.set(16);
    verify_eq!(store.get(&key(2))?, None, "get {} written at t=5 at t=16", key(2));
    verify!(fx.keys()?.is_empty(), "iteration produced expired entries at t=16");
    Ok(())
}

pub fn time_to_idle<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let idle = ExpiryPolicy::time_to_idle(Duration::from_millis(10));
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16).with_expiry(idle))?;
    let store = &fx.store;

    store.put(key(1), value(1))?;
    store.put(key(2), value(2))?;

    fx.clock.set(8);
    verify_eq!(store.get(&key(1))?, Some(value(1)), "get {} at t=8", key(1));
    fx.clock.set(17);
    verify_eq!(
        store.get(&key(1))?,
        Some(value(1)),
        "get {} refreshed at t=8, read at t=17",
        key(1)
    );
    verify_eq!(store.get(&key(2))?, None, "get {} idle since t=0, read at t=17", key(2));

    fx.clock.set(28);
    verify_eq!(store.get(&key(1))?, None, "get {} idle since t=17, read at t=28", key(1));
    Ok(())
}

/// When full, an expired entry is evicted before any live one, whatever the
/// eviction policy would have picked.
pub fn expired_evicted_first<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let config = StoreConfig::new(2)
        .with_eviction(EvictionPolicy::Lru)
        .with_expiry(ttl(10));
    let fx = Fixture::<String, String>::new(factory, config)?;
    let store = &fx.store;

    store.put(key(1), value(1))?;
    fx.clock.set(5);
    store.put(key(2), value(2))?;
    fx.clock.set(9);
    store.get(&key(1))?;

    // key 1 is most recently used but expired; key 2 is least recently used
    fx.clock.set(11);
    store.put(key(3), value(3))?;

    verify_eq!(fx.keys()?, HashSet::from([key(2), key(3)]), "survivors after eviction at t=11");
    verify_eq!(store.get(&key(2))?, Some(value(2)), "live entry kept over expired one");
    Ok(())
}

/// Writes over an expired entry behave like writes to an absent key.
pub fn write_over_expired<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16).with_expiry(ttl(10)))?;
    let store = &fx.store;

    for i in 1..=3 {
        store.put(key(i), value(i))?;
    }
    fx.clock.set(15);

    store.put(key(1), value(10))?;
    verify_eq!(
        store.put_if_absent(key(2), value(20))?,
        None,
        "put_if_absent over expired {}",
        key(2)
    );
    verify_eq!(store.replace(&key(3), value(30))?, None, "replace of expired {}", key(3));

    fx.clock.set(20);
    verify_eq!(store.get(&key(1))?, Some(value(10)), "put over expired restarts its lifetime");
    verify_eq!(store.get(&key(2))?, Some(value(20)), "put_if_absent over expired installs");
    verify_eq!(store.get(&key(3))?, None, "replace of an expired entry installs nothing");
    Ok(())
}

/// A put over an idle entry is a fresh insert: the old value is announced as
/// expired and the new one queues behind everything written before it.
pub fn write_over_idle<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let idle = ExpiryPolicy::time_to_idle(Duration::from_millis(10));
    let config = StoreConfig::new(2)
        .with_eviction(EvictionPolicy::Fifo)
        .with_expiry(idle);
    let fx = Fixture::<String, String>::new(factory, config)?;
    let store = &fx.store;

    store.put(key(1), value(1))?;
    fx.clock.set(5);
    store.put(key(2), value(2))?;

    // key 1 has been idle since t=0
    fx.clock.set(12);
    store.put(key(1), value(10))?;
    fx.clock.set(13);
    store.put(key(3), value(3))?;

    verify_eq!(
        fx.keys()?,
        HashSet::from([key(1), key(3)]),
        "survivors after {} was rewritten at t=12",
        key(1)
    );
    verify_eq!(store.get(&key(1))?, Some(value(10)), "get rewritten {}", key(1));
    Ok(())
}
