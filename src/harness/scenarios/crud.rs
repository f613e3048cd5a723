//! Basic single-threaded reads and writes.

use super::{key, value, Fixture};
use crate::config::StoreConfig;
use crate::store::StoreFactory;

pub fn put_get<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16))?;
    let store = &fx.store;

    verify_eq!(store.get(&key(0))?, None, "get on an empty store");
    verify!(!store.contains_key(&key(0))?, "empty store contains {}", key(0));

    for i in 0..10 {
        store.put(key(i), value(i))?;
    }
    for i in 0..10 {
        verify_eq!(store.get(&key(i))?, Some(value(i)), "get {} after put", key(i));
        verify!(store.contains_key(&key(i))?, "contains_key {} after put", key(i));
    }
    verify_eq!(store.get(&key(10))?, None, "get of a key never written");
    verify_eq!(store.len(), 10, "length after 10 puts");
    Ok(())
}

pub fn overwrite<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16))?;
    let store = &fx.store;

    store.put(key(1), value(1))?;
    store.put(key(1), value(2))?;
    store.put(key(1), value(3))?;

    verify_eq!(store.get(&key(1))?, Some(value(3)), "get after overwrites");
    verify_eq!(store.len(), 1, "length after overwriting one key");
    Ok(())
}

pub fn remove<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16))?;
    let store = &fx.store;

    verify_eq!(store.remove(&key(1))?, None, "remove of an absent key");

    store.put(key(1), value(1))?;
    store.put(key(2), value(2))?;
    verify_eq!(store.remove(&key(1))?, Some(value(1)), "first remove");
    verify_eq!(store.remove(&key(1))?, None, "second remove");
    verify_eq!(store.get(&key(1))?, None, "get after remove");
    verify!(!store.contains_key(&key(1))?, "contains_key after remove");
    verify_eq!(store.get(&key(2))?, Some(value(2)), "neighbour survives remove");
    verify_eq!(store.len(), 1, "length after remove");
    Ok(())
}

pub fn clear<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16))?;
    let store = &fx.store;

    for i in 0..8 {
        store.put(key(i), value(i))?;
    }
    store.clear()?;

    verify!(store.is_empty(), "store not empty after clear: len {}", store.len());
    verify!(fx.keys()?.is_empty(), "iteration after clear produced entries");
    verify_eq!(store.get(&key(3))?, None, "get after clear");

    store.put(key(3), value(30))?;
    verify_eq!(store.get(&key(3))?, Some(value(30)), "put after clear");
    verify_eq!(store.len(), 1, "length after put following clear");
    Ok(())
}
