//! Configuration Module
//!
//! Resolves store configuration from code, JSON or environment variables.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StoreError};
use crate::store::{EvictionPolicy, ExpiryPolicy};

// == Defaults ==
/// Capacity used when none is configured
pub const DEFAULT_CAPACITY: usize = 1000;
/// Shard count used when none is configured
pub const DEFAULT_SHARDS: usize = 16;
/// Upper bound on the shard count
pub const MAX_SHARDS: usize = 1024;

/// Store configuration parameters.
///
/// The clock is not serialized; deserialized configurations read wall time
/// until [`StoreConfig::with_clock`] injects another source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of entries the store can hold
    pub capacity: usize,
    /// Number of independently locked shards, rounded up to a power of two
    pub shards: usize,
    /// Victim selection on overflow
    pub eviction: EvictionPolicy,
    /// Expiry thresholds
    pub expiry: ExpiryPolicy,
    /// Time source for entry metadata
    #[serde(skip, default = "system_clock")]
    pub clock: Arc<dyn Clock>,
}

fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

impl StoreConfig {
    /// Creates a configuration with `capacity` and defaults elsewhere.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_expiry(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // == Validate ==
    /// Rejects configurations no store can honor.
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(StoreError::InvalidConfig(
                "shard count must be at least 1".to_string(),
            ));
        }
        if self.shards > MAX_SHARDS {
            return Err(StoreError::InvalidConfig(format!(
                "shard count {} exceeds maximum of {}",
                self.shards, MAX_SHARDS
            )));
        }
        Ok(())
    }

    // == From Env ==
    /// Creates a StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `HEAPSTORE_CAPACITY` - Maximum entries (default: 1000)
    /// - `HEAPSTORE_SHARDS` - Shard count (default: 16)
    /// - `HEAPSTORE_EVICTION` - `lru`, `lfu` or `fifo` (default: lru)
    /// - `HEAPSTORE_TTL_MS` - Time to live in milliseconds (default: none)
    /// - `HEAPSTORE_TTI_MS` - Time to idle in milliseconds (default: none)
    ///
    /// Unset variables fall back to defaults; malformed or negative values are
    /// rejected rather than silently replaced.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(capacity) = env_parse::<i64>("HEAPSTORE_CAPACITY")? {
            if capacity < 0 {
                return Err(StoreError::InvalidConfig(format!(
                    "HEAPSTORE_CAPACITY must not be negative, got {}",
                    capacity
                )));
            }
            config.capacity = capacity as usize;
        }
        if let Some(shards) = env_parse::<usize>("HEAPSTORE_SHARDS")? {
            config.shards = shards;
        }
        if let Some(eviction) = env_parse::<EvictionPolicy>("HEAPSTORE_EVICTION")? {
            config.eviction = eviction;
        }
        if let Some(ttl) = env_parse::<u64>("HEAPSTORE_TTL_MS")? {
            config.expiry = config.expiry.with_time_to_live(Duration::from_millis(ttl));
        }
        if let Some(tti) = env_parse::<u64>("HEAPSTORE_TTI_MS")? {
            config.expiry = config.expiry.with_time_to_idle(Duration::from_millis(tti));
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            shards: DEFAULT_SHARDS,
            eviction: EvictionPolicy::default(),
            expiry: ExpiryPolicy::default(),
            clock: system_clock(),
        }
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e| {
            StoreError::InvalidConfig(format!("{} has invalid value '{}': {}", name, raw, e))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 5] = [
        "HEAPSTORE_CAPACITY",
        "HEAPSTORE_SHARDS",
        "HEAPSTORE_EVICTION",
        "HEAPSTORE_TTL_MS",
        "HEAPSTORE_TTI_MS",
    ];

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.shards, 16);
        assert_eq!(config.eviction, EvictionPolicy::Lru);
        assert!(config.expiry.is_eternal());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = StoreConfig::new(8)
            .with_shards(2)
            .with_eviction(EvictionPolicy::Fifo)
            .with_expiry(ExpiryPolicy::time_to_live(Duration::from_millis(10)));

        assert_eq!(config.capacity, 8);
        assert_eq!(config.shards, 2);
        assert_eq!(config.eviction, EvictionPolicy::Fifo);
        assert_eq!(config.expiry.time_to_live_ms, Some(10));
    }

    #[test]
    fn test_validate_shards() {
        assert!(matches!(
            StoreConfig::new(1).with_shards(0).validate(),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            StoreConfig::new(1).with_shards(MAX_SHARDS + 1).validate(),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(StoreConfig::new(0).with_shards(3).validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"capacity":64,"eviction":"lfu","expiry":{"time_to_idle_ms":250}}"#,
        )
        .unwrap();

        assert_eq!(config.capacity, 64);
        assert_eq!(config.shards, DEFAULT_SHARDS);
        assert_eq!(config.eviction, EvictionPolicy::Lfu);
        assert_eq!(config.expiry.time_to_idle_ms, Some(250));

        // Negative capacity never deserializes
        assert!(serde_json::from_str::<StoreConfig>(r#"{"capacity":-1}"#).is_err());
    }

    // Every env scenario lives in one test so parallel tests never observe
    // each other's variables.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }
        let config = StoreConfig::from_env().unwrap();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.shards, DEFAULT_SHARDS);

        env::set_var("HEAPSTORE_CAPACITY", "32");
        env::set_var("HEAPSTORE_EVICTION", "fifo");
        env::set_var("HEAPSTORE_TTL_MS", "1500");
        let config = StoreConfig::from_env().unwrap();
        assert_eq!(config.capacity, 32);
        assert_eq!(config.eviction, EvictionPolicy::Fifo);
        assert_eq!(config.expiry.time_to_live_ms, Some(1500));

        env::set_var("HEAPSTORE_CAPACITY", "-5");
        assert!(matches!(
            StoreConfig::from_env(),
            Err(StoreError::InvalidConfig(_))
        ));

        env::set_var("HEAPSTORE_CAPACITY", "lots");
        assert!(matches!(
            StoreConfig::from_env(),
            Err(StoreError::InvalidConfig(_))
        ));

        env::set_var("HEAPSTORE_CAPACITY", "32");
        env::set_var("HEAPSTORE_SHARDS", "0");
        assert!(matches!(
            StoreConfig::from_env(),
            Err(StoreError::InvalidConfig(_))
        ));

        for var in VARS {
            env::remove_var(var);
        }
    }
}
