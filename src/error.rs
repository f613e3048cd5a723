//! Error types for the store, its configuration and the conformance harness
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for store construction and store access.
///
/// Ordinary misses are never errors; operations return `None`/`false` for
/// absent keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Configuration rejected at construction (negative capacity, bad shard
    /// count, malformed environment value)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The store could not service an operation
    #[error("Store access failed: {0}")]
    Access(String),
}

// == Harness Error ==
/// Raised by [`Report::report_and_throw`](crate::harness::Report::report_and_throw)
/// when any conformance scenario did not pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    /// One or more scenarios failed or errored; `details` lists every one of
    /// them, one per line
    #[error("{failed} scenario(s) failed and {errored} errored:\n{details}")]
    SuiteFailed {
        failed: usize,
        errored: usize,
        details: String,
    },
}

// == Result Type Alias ==
/// Convenience Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::InvalidConfig("capacity must not be negative".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: capacity must not be negative"
        );

        let err = StoreError::Access("shard poisoned".to_string());
        assert_eq!(err.to_string(), "Store access failed: shard poisoned");
    }

    #[test]
    fn test_harness_error_display() {
        let err = HarnessError::SuiteFailed {
            failed: 1,
            errored: 1,
            details: "a: broken\nb: crashed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "1 scenario(s) failed and 1 errored:\na: broken\nb: crashed"
        );
    }
}
