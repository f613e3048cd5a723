//! Multi-threaded scenarios.
//!
//! Workers record every operation with a start and end ticket drawn from one
//! shared counter. A ticket order is a valid real-time order, so an operation
//! whose start ticket is greater than another's end ticket must linearize
//! after it. Written values are unique stamps naming their key and writer,
//! which makes torn or misplaced entries detectable.

use std::collections::{HashMap, HashSet};
use std::panic;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Fixture;
use crate::config::StoreConfig;
use crate::harness::Violation;
use crate::store::{Store, StoreFactory};

const WORKERS: usize = 8;
const OPS_PER_WORKER: usize = 1000;
const KEYS: u32 = 16;
const SEED: u64 = 0x5eed_cafe;

/// A value that identifies the write that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Stamp {
    key: u32,
    writer: u32,
    op: u32,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Get(Option<Stamp>),
    Put(Stamp),
    PutIfAbsent(Stamp, Option<Stamp>),
    Remove(Option<Stamp>),
    RemoveIfEqual(Stamp, bool),
    Replace(Stamp, Option<Stamp>),
    ReplaceIfEqual(Stamp, Stamp, bool),
}

impl Op {
    /// The stamp this operation installed, if it changed the entry.
    fn installed(&self) -> Option<Stamp> {
        match *self {
            Op::Put(s) => Some(s),
            Op::PutIfAbsent(s, None) => Some(s),
            Op::Replace(s, Some(_)) => Some(s),
            Op::ReplaceIfEqual(_, s, true) => Some(s),
            _ => None,
        }
    }

    /// True if this operation removed the entry.
    fn removed(&self) -> bool {
        matches!(self, Op::Remove(Some(_)) | Op::RemoveIfEqual(_, true))
    }

    /// The stamp this operation displaced without writing over it blind.
    fn displaced(&self) -> Option<Stamp> {
        match *self {
            Op::Remove(Some(s)) | Op::RemoveIfEqual(s, true) | Op::Replace(_, Some(s)) => Some(s),
            Op::ReplaceIfEqual(s, _, true) => Some(s),
            _ => None,
        }
    }

    /// Stamps this operation reported as the entry's value.
    fn observed(&self) -> Option<Stamp> {
        match *self {
            Op::Get(s) | Op::PutIfAbsent(_, s) | Op::Remove(s) | Op::Replace(_, s) => s,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Record {
    key: u32,
    start: u64,
    end: u64,
    op: Op,
}

fn run_worker(
    store: &dyn Store<u32, Stamp>,
    tickets: &AtomicU64,
    barrier: &Barrier,
    writer: u32,
) -> anyhow::Result<Vec<Record>> {
    let mut rng = StdRng::seed_from_u64(SEED + writer as u64);
    let mut last_seen: HashMap<u32, Stamp> = HashMap::new();
    let mut records = Vec::with_capacity(OPS_PER_WORKER);
    barrier.wait();

    for n in 0..OPS_PER_WORKER {
        let key = rng.random_range(0..KEYS);
        let stamp = Stamp {
            key,
            writer,
            op: n as u32,
        };
        let expected = last_seen.get(&key).copied().unwrap_or(stamp);

        let start = tickets.fetch_add(1, Ordering::SeqCst);
        let op = match rng.random_range(0..7) {
            0 => Op::Get(store.get(&key)?),
            1 => {
                store.put(key, stamp)?;
                Op::Put(stamp)
            }
            2 => Op::PutIfAbsent(stamp, store.put_if_absent(key, stamp)?),
            3 => Op::Remove(store.remove(&key)?),
            4 => Op::RemoveIfEqual(expected, store.remove_if_equal(&key, &expected)?),
            5 => Op::Replace(stamp, store.replace(&key, stamp)?),
            _ => Op::ReplaceIfEqual(
                expected,
                stamp,
                store.replace_if_equal(&key, &expected, stamp)?,
            ),
        };
        let end = tickets.fetch_add(1, Ordering::SeqCst);

        if let Some(seen) = op.observed() {
            last_seen.insert(key, seen);
        }
        if let Some(written) = op.installed() {
            last_seen.insert(key, written);
        }
        records.push(Record { key, start, end, op });
    }
    Ok(records)
}

/// Runs `work` on every worker thread while a sampler checks `len()` against
/// `capacity`, returning each worker's output.
fn with_sampler<T: Send>(
    store: &dyn Store<u32, Stamp>,
    capacity: usize,
    work: impl Fn(u32) -> anyhow::Result<T> + Sync,
) -> anyhow::Result<Vec<T>> {
    let done = AtomicBool::new(false);
    let max_len = AtomicUsize::new(0);

    let joined = thread::scope(|scope| {
        let sampler = scope.spawn(|| {
            while !done.load(Ordering::Acquire) {
                max_len.fetch_max(store.len(), Ordering::AcqRel);
                thread::yield_now();
            }
        });
        let workers: Vec<_> = (0..WORKERS as u32)
            .map(|writer| {
                let work = &work;
                scope.spawn(move || work(writer))
            })
            .collect();

        // The sampler must stop even when a worker panicked
        let joined: Vec<_> = workers.into_iter().map(|handle| handle.join()).collect();
        done.store(true, Ordering::Release);
        if let Err(payload) = sampler.join() {
            panic::resume_unwind(payload);
        }
        joined
    });

    let results = joined
        .into_iter()
        .map(|result| result.unwrap_or_else(|payload| panic::resume_unwind(payload)))
        .collect::<anyhow::Result<Vec<T>>>()?;

    let max_len = max_len.into_inner().max(store.len());
    verify!(
        max_len <= capacity,
        "length {} sampled during the run exceeds capacity {}",
        max_len,
        capacity
    );
    Ok(results)
}

/// 8 workers run 1000 random operations each over 16 keys on a capacity-16
/// store, then every key's history is checked for a consistent real-time
/// ordering.
pub fn mixed_linearizable<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<u32, Stamp>::new(factory, StoreConfig::new(KEYS as usize))?;
    let store = &*fx.store;
    let tickets = AtomicU64::new(0);
    let barrier = Barrier::new(WORKERS);

    let records = with_sampler(store, KEYS as usize, |writer| {
        run_worker(store, &tickets, &barrier, writer)
    })?;

    let mut by_key: HashMap<u32, Vec<Record>> = HashMap::new();
    for record in records.into_iter().flatten() {
        by_key.entry(record.key).or_default().push(record);
    }

    let mut present = 0;
    for key in 0..KEYS {
        let history = by_key.remove(&key).unwrap_or_default();
        let final_value = fx
            .store
            .iter()?
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v);
        check_history(key, &history, final_value)?;
        present += usize::from(final_value.is_some());
    }

    verify_eq!(store.len(), present, "length after the run");
    verify_eq!(fx.keys()?.len(), present, "iterated entries after the run");
    Ok(())
}

fn check_history(key: u32, history: &[Record], final_value: Option<Stamp>) -> anyhow::Result<()> {
    // Every installed stamp and the window in which it was written
    let installs: HashMap<Stamp, &Record> = history
        .iter()
        .filter_map(|r| r.op.installed().map(|s| (s, r)))
        .collect();

    let mut displaced = HashSet::new();
    for record in history {
        if let Some(seen) = record.op.observed() {
            verify_eq!(seen.key, key, "stamp {:?} observed under key {}", seen, key);
            let Some(write) = installs.get(&seen) else {
                return Err(Violation(format!(
                    "key {}: observed {:?}, which no successful write installed",
                    key, seen
                ))
                .into());
            };
            verify!(
                write.start < record.end,
                "key {}: {:?} observed before it was written",
                key,
                seen
            );
        }
        if let Some(gone) = record.op.displaced() {
            verify!(
                displaced.insert(gone),
                "key {}: {:?} removed or replaced twice",
                key,
                gone
            );
        }
    }

    match final_value {
        Some(stamp) => {
            verify_eq!(stamp.key, key, "final value key");
            let Some(write) = installs.get(&stamp) else {
                return Err(Violation(format!(
                    "key {}: final value {:?} was never installed",
                    key, stamp
                ))
                .into());
            };
            let later = history
                .iter()
                .filter(|r| r.op.installed().is_some() || r.op.removed())
                .find(|r| r.start > write.end);
            verify!(
                later.is_none(),
                "key {}: final value {:?} survived a later mutation {:?}",
                key,
                stamp,
                later
            );
        }
        None if installs.is_empty() => {}
        None => {
            let last_write_start = installs.values().map(|r| r.start).max().unwrap_or(0);
            let explained = history
                .iter()
                .any(|r| r.op.removed() && r.end > last_write_start);
            verify!(
                explained,
                "key {}: absent at the end, but no removal follows its last write",
                key
            );
        }
    }
    Ok(())
}

/// Racing `put_if_absent` calls on one key have exactly one winner, and every
/// loser sees the winner's value.
pub fn put_if_absent_single_winner<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    let fx = Fixture::<u32, Stamp>::new(factory, StoreConfig::new(4))?;
    let store = &*fx.store;

    for round in 0..20u32 {
        let key = round % 4;
        let barrier = Barrier::new(WORKERS);
        let outcomes = with_sampler(store, 4, |writer| {
            barrier.wait();
            let stamp = Stamp {
                key,
                writer,
                op: round,
            };
            Ok((stamp, store.put_if_absent(key, stamp)?))
        })?;

        let winners: Vec<Stamp> = outcomes
            .iter()
            .filter(|(_, previous)| previous.is_none())
            .map(|(stamp, _)| *stamp)
            .collect();
        verify_eq!(winners.len(), 1, "round {}: put_if_absent winners", round);
        for (stamp, previous) in &outcomes {
            if let Some(previous) = previous {
                verify_eq!(
                    *previous,
                    winners[0],
                    "round {}: writer {} saw a value other than the winner's",
                    round,
                    stamp.writer
                );
            }
        }
        verify_eq!(store.get(&key)?, Some(winners[0]), "round {}: stored value", round);
        store.remove(&key)?;
    }
    Ok(())
}

/// Workers increment a shared counter with `replace_if_equal`; no increment
/// may be lost.
pub fn compare_and_swap_counter<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    const INCREMENTS: u32 = 500;
    let fx = Fixture::<u32, Stamp>::new(factory, StoreConfig::new(4))?;
    let store = &*fx.store;
    let zero = Stamp {
        key: 0,
        writer: 0,
        op: 0,
    };
    store.put(0, zero)?;

    with_sampler(store, 4, |_| {
        for _ in 0..INCREMENTS {
            loop {
                let Some(current) = store.get(&0)? else {
                    return Err(Violation("counter entry vanished".to_string()).into());
                };
                let next = Stamp {
                    op: current.op + 1,
                    ..current
                };
                if store.replace_if_equal(&0, &current, next)? {
                    break;
                }
            }
        }
        Ok(())
    })?;

    let total = store.get(&0)?.map(|s| s.op);
    verify_eq!(total, Some(INCREMENTS * WORKERS as u32), "counter after all increments");
    Ok(())
}

/// Workers insert distinct keys into a small store so nearly every put has to
/// evict. Length must stay bounded and surviving entries must be intact.
pub fn eviction_pressure<F: StoreFactory>(factory: &F) -> anyhow::Result<()> {
    const CAPACITY: usize = 8;
    let fx = Fixture::<u32, Stamp>::new(factory, StoreConfig::new(CAPACITY))?;
    let store = &*fx.store;

    with_sampler(store, CAPACITY, |writer| {
        for n in 0..500u32 {
            let key = writer * 10_000 + n;
            store.put(key, Stamp { key, writer, op: n })?;
            if n % 3 == 0 {
                store.get(&(key / 2))?;
            }
        }
        Ok(())
    })?;

    let entries: Vec<(u32, Stamp)> = store.iter()?.collect();
    verify_eq!(entries.len(), store.len(), "iterated entries against length");
    verify!(
        entries.len() <= CAPACITY,
        "{} entries left in a store of capacity {}",
        entries.len(),
        CAPACITY
    );
    for (key, stamp) in &entries {
        verify_eq!(stamp.key, *key, "stamp stored under key {}", key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(writer: u32, op: u32) -> Stamp {
        Stamp { key: 0, writer, op }
    }

    fn record(start: u64, end: u64, op: Op) -> Record {
        Record {
            key: 0,
            start,
            end,
            op,
        }
    }

    fn violation(history: &[Record], final_value: Option<Stamp>) -> String {
        let err = check_history(0, history, final_value).unwrap_err();
        err.downcast_ref::<Violation>()
            .unwrap_or_else(|| panic!("expected a violation, got {:#}", err))
            .0
            .clone()
    }

    #[test]
    fn test_consistent_history_passes() {
        let (a, b) = (stamp(0, 0), stamp(1, 0));
        let history = [
            record(0, 1, Op::Put(a)),
            record(2, 5, Op::Get(Some(a))),
            record(3, 4, Op::ReplaceIfEqual(a, b, true)),
            record(6, 7, Op::Remove(Some(b))),
        ];

        assert!(check_history(0, &history, None).is_ok());
        assert!(check_history(0, &history[..3], Some(b)).is_ok());
        assert!(check_history(0, &[], None).is_ok());
    }

    #[test]
    fn test_overlapping_read_may_see_the_write() {
        let a = stamp(0, 0);
        // The get ends after the put starts, so it may linearize after it
        let history = [record(1, 4, Op::Put(a)), record(0, 2, Op::Get(Some(a)))];

        assert!(check_history(0, &history, Some(a)).is_ok());
    }

    #[test]
    fn test_detects_read_before_write() {
        let a = stamp(0, 0);
        let history = [record(0, 1, Op::Get(Some(a))), record(2, 3, Op::Put(a))];

        assert!(violation(&history, Some(a)).contains("observed before it was written"));
    }

    #[test]
    fn test_detects_value_never_written() {
        let history = [record(0, 1, Op::Get(Some(stamp(3, 9))))];

        assert!(violation(&history, None).contains("which no successful write installed"));
    }

    #[test]
    fn test_detects_double_displacement() {
        let a = stamp(0, 0);
        let history = [
            record(0, 1, Op::Put(a)),
            record(2, 3, Op::Remove(Some(a))),
            record(4, 5, Op::RemoveIfEqual(a, true)),
        ];

        assert!(violation(&history, None).contains("removed or replaced twice"));
    }

    #[test]
    fn test_detects_stale_final_value() {
        let (a, b) = (stamp(0, 0), stamp(1, 0));
        let history = [record(0, 1, Op::Put(a)), record(2, 3, Op::Put(b))];

        assert!(violation(&history, Some(a)).contains("survived a later mutation"));
        assert!(check_history(0, &history, Some(b)).is_ok());
    }

    #[test]
    fn test_detects_unexplained_absence() {
        let a = stamp(0, 0);
        let history = [record(0, 1, Op::Remove(None)), record(2, 3, Op::Put(a))];

        assert!(violation(&history, None).contains("no removal follows its last write"));
    }

    #[test]
    fn test_detects_foreign_key() {
        let foreign = Stamp {
            key: 5,
            writer: 0,
            op: 0,
        };
        let history = [record(0, 1, Op::Get(Some(foreign)))];

        assert!(violation(&history, None).contains("observed under key 0"));
    }
}
