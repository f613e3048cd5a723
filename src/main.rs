//! Heapstore conformance runner
//!
//! Certifies the built-in on-heap store against the store contract and exits
//! non-zero if any scenario fails.

use heapstore::{OnHeapStoreFactory, StoreConfig, StoreTester};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the conformance runner.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Run the conformance suite against the on-heap store
/// 4. Report every failed or errored scenario
///
/// Only `HEAPSTORE_SHARDS` shapes the certified stores. Each scenario picks
/// its own capacity, eviction and expiry, so the remaining `HEAPSTORE_*`
/// variables are validated here but otherwise apply only to stores an
/// embedding application builds with `StoreConfig::from_env`.
fn main() -> anyhow::Result<()> {
    // Defaults to "heapstore=info", can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heapstore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StoreConfig::from_env()?;
    info!("Certifying on-heap store with {} shards", config.shards);

    let tester = StoreTester::new(OnHeapStoreFactory::with_shards(config.shards));
    let report = tester.run_test_suite();
    debug!("Conformance report:\n{}", report.to_json()?);

    report.report_and_throw()?;
    info!("On-heap store conforms");
    Ok(())
}
