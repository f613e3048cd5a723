//! Iteration consistency.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use super::{key, value, Fixture};
use crate::config::StoreConfig;
use crate::store::{Store, StoreFactory};

const STABLE_KEYS: usize = 64;
const CHURN_KEYS: usize = 32;
const PASSES: usize = 50;

pub fn restartable<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<String, String>::new(factory, StoreConfig::new(32))?;
    let store = &fx.store;
    for i in 0..20 {
        store.put(key(i), value(i))?;
    }

    let first: HashSet<(String, String)> = store.iter()?.collect();
    let second: HashSet<(String, String)> = store.iter()?.collect();
    verify_eq!(first.len(), 20, "entries in the first pass");
    verify_eq!(first, second, "two passes over a quiescent store");
    verify!(
        first.iter().all(|(k, v)| k[1..] == v[1..]),
        "iteration paired a key with another key's value"
    );

    store.remove(&key(0))?;
    store.put(key(20), value(20))?;
    let third = fx.keys()?;
    verify!(!third.contains(&key(0)), "pass after remove still produced {}", key(0));
    verify!(third.contains(&key(20)), "pass after put missed {}", key(20));
    Ok(())
}

/// Writers rewrite a stable set of keys and churn a second set while readers
/// iterate. Every pass must produce each stable key exactly once with a value
/// that belongs to it.
pub fn consistent_under_mutation<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let config = StoreConfig::new(STABLE_KEYS + CHURN_KEYS);
    let fx = Fixture::<String, String>::new(factory, config)?;
    let store = &*fx.store;
    for i in 0..STABLE_KEYS {
        store.put(key(i), format!("{}#0", key(i)))?;
    }
    let done = AtomicBool::new(false);

    let outcome = thread::scope(|scope| {
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let done = &done;
                scope.spawn(move || -> anyhow::Result<()> {
                    let mut n = 0usize;
                    while !done.load(Ordering::Acquire) {
                        n += 1;
                        let stable = key((n * 7 + w) % STABLE_KEYS);
                        store.put(stable.clone(), format!("{}#{}", stable, n))?;
                        let churn = key(STABLE_KEYS + (n + w) % CHURN_KEYS);
                        if n % 2 == 0 {
                            store.put(churn.clone(), format!("{}#{}", churn, n))?;
                        } else {
                            store.remove(&churn)?;
                        }
                    }
                    Ok(())
                })
            })
            .collect();

        let readers: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| iterate_passes(store)))
            .collect();

        let read = readers
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>();
        done.store(true, Ordering::Release);
        let written = writers
            .into_iter()
            .map(|handle| handle.join())
            .collect::<Vec<_>>();
        (read, written)
    });

    let (read, written) = outcome;
    for result in written.into_iter().chain(read) {
        result.unwrap_or_else(|payload| std::panic::resume_unwind(payload))?;
    }
    Ok(())
}

fn iterate_passes(store: &dyn Store<String, String>) -> anyhow::Result<()> {
    for pass in 0..PASSES {
        let mut seen = HashSet::new();
        for (k, v) in store.iter()? {
            verify!(
                v.starts_with(&format!("{}#", k)),
                "pass {}: key {} paired with value {}",
                pass,
                k,
                v
            );
            verify!(seen.insert(k.clone()), "pass {}: key {} produced twice", pass, k);
        }
        let missing: Vec<String> = (0..STABLE_KEYS)
            .map(key)
            .filter(|k| !seen.contains(k))
            .collect();
        verify!(
            missing.is_empty(),
            "pass {}: keys present throughout were not produced: {:?}",
            pass,
            missing
        );
    }
    Ok(())
}
