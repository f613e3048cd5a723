//! Expiry Reaper Task
//!
//! Background task that periodically removes expired store entries, so
//! entries nobody reads again do not hold capacity until they are evicted.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::{OnHeapStore, StoreKey, StoreValue};

/// Spawns a background task that periodically reaps expired entries.
///
/// The task runs until aborted, sleeping for `interval` between sweeps. Each
/// sweep locks one shard at a time, so it never blocks the whole store.
///
/// # Arguments
/// * `store` - shared reference to the store to sweep
/// * `interval` - time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(OnHeapStore::new(config)?);
/// let reaper = spawn_reaper_task(store.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// reaper.abort();
/// ```
pub fn spawn_reaper_task<K: StoreKey, V: StoreValue>(
    store: Arc<OnHeapStore<K, V>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry reaper with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.reap_expired();
            if removed > 0 {
                info!("Expiry reaper: removed {} expired entries", removed);
            } else {
                debug!("Expiry reaper: no expired entries found");
            }
        }
    })
}
