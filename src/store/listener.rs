//! Store event listener, notified whenever the store removes an entry on its
//! own initiative.

// == Removal Cause ==
/// Why the store removed an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Chosen as the eviction victim to make room for a fresh insert
    Capacity,
    /// Found expired on access, during eviction or by the reaper
    Expired,
}

// == Store Event Listener ==
/// Callback for evictions and expirations.
///
/// Explicit removals (`remove`, `clear`, conditional removes) are not
/// reported. The store invokes the listener after releasing its shard lock,
/// so calling back into the store is allowed.
pub trait StoreEventListener<K, V>: Send + Sync + 'static {
    fn on_removal(&self, key: &K, value: &V, cause: RemovalCause);
}

/// A [`StoreEventListener`] backed by a closure.
pub struct FnListener<F>(pub F);

impl<K, V, F> StoreEventListener<K, V> for FnListener<F>
where
    F: Fn(&K, &V, RemovalCause) + Send + Sync + 'static,
{
    fn on_removal(&self, key: &K, value: &V, cause: RemovalCause) {
        (self.0)(key, value, cause)
    }
}
