//! Single-threaded semantics of the conditional operations.

use super::{key, value, Fixture};
use crate::config::StoreConfig;
use crate::store::StoreFactory;

pub fn put_if_absent<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16))?;
    let store = &fx.store;

    verify_eq!(store.put_if_absent(key(1), value(1))?, None, "first put_if_absent");
    verify_eq!(
        store.put_if_absent(key(1), value(2))?,
        Some(value(1)),
        "second put_if_absent returns the first value"
    );
    verify_eq!(store.get(&key(1))?, Some(value(1)), "losing put_if_absent left the value alone");

    store.remove(&key(1))?;
    verify_eq!(store.put_if_absent(key(1), value(3))?, None, "put_if_absent after remove");
    verify_eq!(store.get(&key(1))?, Some(value(3)), "get after put_if_absent following remove");
    verify_eq!(store.len(), 1, "length");
    Ok(())
}

pub fn replace<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16))?;
    let store = &fx.store;

    verify_eq!(store.replace(&key(1), value(1))?, None, "replace of an absent key");
    verify!(!store.contains_key(&key(1))?, "replace inserted an absent key");
    verify_eq!(store.len(), 0, "length after replace of an absent key");

    store.put(key(1), value(1))?;
    verify_eq!(store.replace(&key(1), value(2))?, Some(value(1)), "replace of a present key");
    verify_eq!(store.get(&key(1))?, Some(value(2)), "get after replace");
    Ok(())
}

pub fn replace_if_equal<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16))?;
    let store = &fx.store;

    verify!(
        !store.replace_if_equal(&key(1), &value(1), value(2))?,
        "replace_if_equal succeeded on an absent key"
    );
    verify!(!store.contains_key(&key(1))?, "replace_if_equal inserted an absent key");

    store.put(key(1), value(1))?;
    verify!(
        !store.replace_if_equal(&key(1), &value(9), value(2))?,
        "replace_if_equal succeeded with a stale expectation"
    );
    verify_eq!(store.get(&key(1))?, Some(value(1)), "value after failed replace_if_equal");

    verify!(
        store.replace_if_equal(&key(1), &value(1), value(2))?,
        "replace_if_equal failed with a current expectation"
    );
    verify_eq!(store.get(&key(1))?, Some(value(2)), "value after replace_if_equal");
    Ok(())
}

pub fn remove_if_equal<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(16))?;
    let store = &fx.store;

    verify!(
        !store.remove_if_equal(&key(1), &value(1))?,
        "remove_if_equal succeeded on an absent key"
    );

    store.put(key(1), value(1))?;
    verify!(
        !store.remove_if_equal(&key(1), &value(2))?,
        "remove_if_equal succeeded with the wrong value"
    );
    verify!(store.contains_key(&key(1))?, "failed remove_if_equal removed the entry");

    verify!(
        store.remove_if_equal(&key(1), &value(1))?,
        "remove_if_equal failed with the current value"
    );
    verify_eq!(store.get(&key(1))?, None, "get after remove_if_equal");
    verify_eq!(store.len(), 0, "length after remove_if_equal");
    Ok(())
}
