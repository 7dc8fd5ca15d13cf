//! Result aggregation and reporting.
//!
//! Collects check results and generates summaries.

use crate::{Check, CheckCategory, CheckResult};
use serde::Serialize;

/// Result summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub total: u32,
    pub total_duration_ms: u64,
}

impl ResultSummary {
    fn from_checks(checks: &[Check]) -> Self {
        let mut summary = ResultSummary::default();

        for check in checks {
            summary.total += 1;

            match &check.result {
                Some(CheckResult::Pass { duration_ms, .. }) => {
                    summary.passed += 1;
                    summary.total_duration_ms += duration_ms;
                }
                Some(CheckResult::Fail { duration_ms, .. }) => {
                    summary.failed += 1;
                    summary.total_duration_ms += duration_ms;
                }
                Some(CheckResult::Skip { .. }) | None => {
                    summary.skipped += 1;
                }
            }
        }

        summary
    }
}

/// Report of one run: every executed check with its result and evidence
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub timestamp: u64,
    /// Where the objects under test came from
    pub source: String,
    pub checks: Vec<Check>,
    pub total_duration_ms: u64,
    /// Discovery lookups that failed without stopping the run
    pub discovery_errors: Vec<String>,
}

impl ValidationReport {
    /// Create a new empty report
    pub fn new() -> Self {
        ValidationReport {
            timestamp: get_unix_timestamp(),
            source: String::new(),
            checks: Vec::new(),
            total_duration_ms: 0,
            discovery_errors: Vec::new(),
        }
    }

    /// Calculate summary statistics
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::from_checks(&self.checks)
    }

    /// Look up a check by ID
    pub fn check(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.id == id)
    }

    /// Every claims line of the run, in check order
    pub fn claims(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .flat_map(|c| c.claims.iter().map(String::as_str))
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Result aggregator for collecting check results
pub struct ResultAggregator {
    checks: Vec<Check>,
    source: String,
    total_duration_ms: u64,
    discovery_errors: Vec<String>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        ResultAggregator {
            checks: Vec::new(),
            source: String::new(),
            total_duration_ms: 0,
            discovery_errors: Vec::new(),
        }
    }

    /// Record discovery lookups that failed but did not stop the run
    pub fn set_discovery_errors(&mut self, errors: Vec<String>) {
        self.discovery_errors = errors;
    }

    /// Set report metadata
    pub fn set_metadata(&mut self, source: String, total_duration_ms: u64) {
        self.source = source;
        self.total_duration_ms = total_duration_ms;
    }

    /// Add a completed check result
    pub fn add_result(&mut self, check: Check) {
        self.checks.push(check);
    }

    pub fn has_failures(&self) -> bool {
        self.checks
            .iter()
            .any(|c| matches!(&c.result, Some(CheckResult::Fail { .. })))
    }

    pub fn get_summary(&self) -> ResultSummary {
        ResultSummary::from_checks(&self.checks)
    }

    pub fn get_by_category(&self, category: CheckCategory) -> Vec<&Check> {
        self.checks
            .iter()
            .filter(|c| c.category == category)
            .collect()
    }

    pub fn get_failures(&self) -> Vec<&Check> {
        self.checks
            .iter()
            .filter(|c| matches!(&c.result, Some(CheckResult::Fail { .. })))
            .collect()
    }

    /// Create final validation report
    pub fn to_report(&self) -> ValidationReport {
        ValidationReport {
            timestamp: get_unix_timestamp(),
            source: self.source.clone(),
            checks: self.checks.clone(),
            total_duration_ms: self.total_duration_ms,
            discovery_errors: self.discovery_errors.clone(),
        }
    }
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Get current Unix timestamp
pub fn get_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
