//! Conformance Harness Module
//!
//! Certifies any [`StoreFactory`] against a fixed battery of behavioral and
//! concurrency scenarios.
//!
//! ```no_run
//! use heapstore::harness::StoreTester;
//! use heapstore::store::OnHeapStoreFactory;
//!
//! StoreTester::new(OnHeapStoreFactory::new())
//!     .run_test_suite()
//!     .report_and_throw()
//!     .unwrap();
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::store::StoreFactory;

// == Violation ==
/// A contract violation detected by a scenario.
///
/// Scenario errors of this type are reported as failures; any other error is
/// reported as the scenario erroring.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct Violation(pub String);

/// Fails the current scenario with a [`Violation`] unless `cond` holds.
macro_rules! verify {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::harness::Violation(format!($($arg)+)).into());
        }
    };
}

/// Fails the current scenario unless `actual == expected`.
macro_rules! verify_eq {
    ($actual:expr, $expected:expr, $($arg:tt)+) => {
        match (&$actual, &$expected) {
            (actual, expected) => {
                if actual != expected {
                    return Err($crate::harness::Violation(format!(
                        "{}: expected {:?}, got {:?}",
                        format!($($arg)+),
                        expected,
                        actual
                    ))
                    .into());
                }
            }
        }
    };
}

mod model;
mod report;
mod scenarios;

pub use model::ReferenceModel;
pub use report::{Outcome, Report, ScenarioResult};
pub use scenarios::Scenario;

// == Store Tester ==
/// Runs the conformance battery against stores built by a factory.
///
/// Every scenario gets a fresh store, runs once, and never aborts the run.
pub struct StoreTester<F> {
    factory: F,
}

impl<F: StoreFactory> StoreTester<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }

    /// Names of the scenarios in execution order.
    pub fn scenario_names(&self) -> Vec<&'static str> {
        scenarios::all::<F>().iter().map(|s| s.name).collect()
    }

    // == Run Test Suite ==
    /// Runs every scenario and collects the results.
    pub fn run_test_suite(&self) -> Report {
        let started_at = Utc::now();
        let start = Instant::now();

        let results = scenarios::all::<F>()
            .iter()
            .map(|scenario| self.run_scenario(scenario))
            .collect();

        Report::new(results, started_at, start.elapsed())
    }

    /// Runs the scenario called `name`, if there is one.
    pub fn run_one(&self, name: &str) -> Option<ScenarioResult> {
        scenarios::all::<F>()
            .iter()
            .find(|s| s.name == name)
            .map(|scenario| self.run_scenario(scenario))
    }

    fn run_scenario(&self, scenario: &Scenario<F>) -> ScenarioResult {
        let start = Instant::now();
        let run = AssertUnwindSafe(|| (scenario.check)(&self.factory));
        let outcome = match panic::catch_unwind(run) {
            Ok(Ok(())) => Outcome::Passed,
            Ok(Err(err)) => match err.downcast_ref::<Violation>() {
                Some(violation) => Outcome::Failed {
                    reason: violation.to_string(),
                },
                None => Outcome::Errored {
                    reason: format!("{:#}", err),
                },
            },
            Err(payload) => Outcome::Errored {
                reason: format!("panicked: {}", panic_message(payload.as_ref())),
            },
        };

        match &outcome {
            Outcome::Passed => info!("{} passed", scenario.name),
            Outcome::Failed { reason } => warn!("{} failed: {}", scenario.name, reason),
            Outcome::Errored { reason } => warn!("{} errored: {}", scenario.name, reason),
        }
        ScenarioResult::new(scenario.name, outcome, start.elapsed())
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
