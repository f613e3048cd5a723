//! Conformance Report Module
//!
//! Aggregated outcome of one conformance run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::HarnessError;

// == Outcome ==
/// Result of a single scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    /// The store violated the contract
    Failed { reason: String },
    /// The scenario could not run to completion (store error or panic)
    Errored { reason: String },
}

// == Scenario Result ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub elapsed_ms: u64,
}

impl ScenarioResult {
    pub fn new(name: impl Into<String>, outcome: Outcome, elapsed: Duration) -> Self {
        Self {
            name: name.into(),
            outcome,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

// == Report ==
/// Every scenario result of a run, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    started_at: DateTime<Utc>,
    elapsed_ms: u64,
    results: Vec<ScenarioResult>,
}

impl Report {
    pub fn new(results: Vec<ScenarioResult>, started_at: DateTime<Utc>, elapsed: Duration) -> Self {
        Self {
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            results,
        }
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Looks up a scenario by name.
    pub fn result(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed { .. }))
            .count()
    }

    pub fn errored(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Errored { .. }))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(ScenarioResult::passed)
    }

    // == Summary ==
    /// One-line tally of the run.
    pub fn summary(&self) -> String {
        format!(
            "{} scenarios: {} passed, {} failed, {} errored in {}ms",
            self.results.len(),
            self.passed(),
            self.failed(),
            self.errored(),
            self.elapsed_ms
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    // == Report And Throw ==
    /// Logs the run and fails if any scenario did not pass.
    ///
    /// The error lists every failed and errored scenario, not just the first.
    pub fn report_and_throw(self) -> Result<(), HarnessError> {
        info!("Conformance run: {}", self.summary());
        if self.is_success() {
            return Ok(());
        }

        let details = self
            .results
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::Passed => None,
                Outcome::Failed { reason } => Some(format!("{} failed: {}", r.name, reason)),
                Outcome::Errored { reason } => Some(format!("{} errored: {}", r.name, reason)),
            })
            .inspect(|line| warn!("{}", line))
            .collect::<Vec<_>>()
            .join("\n");

        Err(HarnessError::SuiteFailed {
            failed: self.failed(),
            errored: self.errored(),
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, outcome: Outcome) -> ScenarioResult {
        ScenarioResult::new(name, outcome, Duration::from_millis(3))
    }

    fn report(results: Vec<ScenarioResult>) -> Report {
        Report::new(results, Utc::now(), Duration::from_millis(10))
    }

    #[test]
    fn test_all_passed() {
        let report = report(vec![
            result("crud/a", Outcome::Passed),
            result("crud/b", Outcome::Passed),
        ]);

        assert!(report.is_success());
        assert_eq!(report.passed(), 2);
        assert_eq!(report.summary(), "2 scenarios: 2 passed, 0 failed, 0 errored in 10ms");
        assert!(report.report_and_throw().is_ok());
    }

    #[test]
    fn test_report_and_throw_lists_every_problem() {
        let report = report(vec![
            result(
                "capacity/bound",
                Outcome::Failed {
                    reason: "len 5 exceeds capacity 4".to_string(),
                },
            ),
            result("crud/get", Outcome::Passed),
            result(
                "expiry/ttl",
                Outcome::Errored {
                    reason: "panicked: boom".to_string(),
                },
            ),
        ]);

        assert_eq!(report.failed(), 1);
        assert_eq!(report.errored(), 1);
        assert!(report.result("crud/get").unwrap().passed());

        let err = report.report_and_throw().unwrap_err();
        assert_eq!(
            err,
            HarnessError::SuiteFailed {
                failed: 1,
                errored: 1,
                details: "capacity/bound failed: len 5 exceeds capacity 4\n\
                          expiry/ttl errored: panicked: boom"
                    .to_string(),
            }
        );
    }

    #[test]
    fn test_json_shape() {
        let report = report(vec![result(
            "crud/a",
            Outcome::Failed {
                reason: "nope".to_string(),
            },
        )]);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["results"][0]["name"], "crud/a");
        assert_eq!(json["results"][0]["status"], "failed");
        assert_eq!(json["results"][0]["reason"], "nope");
        assert_eq!(json["elapsed_ms"], 10);
    }
}
