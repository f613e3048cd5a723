//! Heapstore - a capacity-bounded concurrent on-heap store
//!
//! Provides a sharded key/value store with pluggable eviction and expiry
//! policies, and a conformance tester that certifies any store
//! implementation against the store contract.

pub mod clock;
pub mod config;
pub mod error;
pub mod harness;
pub mod store;
pub mod tasks;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use error::{HarnessError, StoreError};
pub use harness::{Report, StoreTester};
pub use store::{OnHeapStore, OnHeapStoreFactory, Store, StoreFactory};
pub use tasks::spawn_reaper_task;
