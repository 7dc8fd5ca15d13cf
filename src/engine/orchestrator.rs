//! Check execution orchestrator.
//!
//! Manages check registration and sequential execution against one
//! [`CheckContext`].
//!
//! # Graceful Degradation
//!
//! This module handles errors gracefully:
//! - Check panics: Caught via std::panic::catch_unwind, converted to Fail result
//! - Run deadline passed before a check starts: Fail result, check not run
//! - Invalid check ID: Silently skipped in run_specific/run_excluding
//! - Empty check list: Returns empty report (not an error)
//!
//! Checks run one at a time in registration order so the claims log reads
//! in a deterministic order. After each check, the lines it appended are
//! taken from the log and attached to its result.

use crate::checks::{icmp, ports, services};
use crate::engine::context::CheckContext;
use crate::engine::result::{ResultAggregator, ValidationReport};
use crate::{Check, CheckCategory, CheckResult};
use std::time::Instant;
use tracing::info;

/// Orchestrator configuration
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub fail_fast: bool,
}

/// Body of a check.
pub type CheckFn = Box<dyn Fn(&CheckContext<'_>) -> CheckResult + Send + Sync>;

/// A registered check with its execution function
pub struct RegisteredCheck {
    pub id: String,
    pub name: String,
    pub category: CheckCategory,
    pub description: String,
    pub check_fn: CheckFn,
}

/// Check orchestrator
pub struct CheckOrchestrator {
    config: OrchestratorConfig,
    checks: Vec<RegisteredCheck>,
}

impl CheckOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        CheckOrchestrator {
            config,
            checks: Vec::new(),
        }
    }

    /// Register checks for execution
    pub fn register_checks(&mut self, checks: Vec<RegisteredCheck>) {
        self.checks.extend(checks);
    }

    /// Register a single check
    pub fn register_check(&mut self, check: RegisteredCheck) {
        self.checks.push(check);
    }

    /// Run all registered checks
    pub fn run_all(&self, ctx: &CheckContext<'_>) -> ValidationReport {
        self.run_filtered(ctx, |_| true)
    }

    /// Run checks in a specific category
    pub fn run_category(&self, ctx: &CheckContext<'_>, category: CheckCategory) -> ValidationReport {
        self.run_filtered(ctx, |c| c.category == category)
    }

    /// Run checks in multiple categories
    pub fn run_categories(
        &self,
        ctx: &CheckContext<'_>,
        categories: &[CheckCategory],
    ) -> ValidationReport {
        self.run_filtered(ctx, |c| categories.contains(&c.category))
    }

    /// Run specific checks by ID
    pub fn run_specific(&self, ctx: &CheckContext<'_>, check_ids: &[String]) -> ValidationReport {
        self.run_filtered(ctx, |c| check_ids.contains(&c.id))
    }

    /// Run all checks except specified IDs
    pub fn run_excluding(&self, ctx: &CheckContext<'_>, skip_ids: &[String]) -> ValidationReport {
        self.run_filtered(ctx, |c| !skip_ids.contains(&c.id))
    }

    fn run_filtered<F>(&self, ctx: &CheckContext<'_>, select: F) -> ValidationReport
    where
        F: Fn(&RegisteredCheck) -> bool,
    {
        let start = Instant::now();
        let mut aggregator = ResultAggregator::new();

        for check in self.checks.iter().filter(|c| select(*c)) {
            info!(id = %check.id, name = %check.name, "running check");
            let result = self.execute_check(ctx, check);
            info!(id = %check.id, result = %result, "check finished");

            let failed = matches!(result, CheckResult::Fail { .. });
            aggregator.add_result(Check {
                id: check.id.clone(),
                name: check.name.clone(),
                category: check.category,
                description: check.description.clone(),
                result: Some(result),
                claims: ctx.claims.take(),
            });

            if self.config.fail_fast && failed {
                break;
            }
        }

        aggregator.set_discovery_errors(ctx.discovery_errors.clone());
        aggregator.set_metadata(ctx.discovery.source(), start.elapsed().as_millis() as u64);
        aggregator.to_report()
    }

    /// Execute a single check, converting panics and deadline overruns to Fail
    fn execute_check(&self, ctx: &CheckContext<'_>, check: &RegisteredCheck) -> CheckResult {
        let start = Instant::now();

        if ctx.expired() {
            return CheckResult::Fail {
                message: "Run deadline exceeded before the check started".to_string(),
                details: "Increase --timeout or narrow the selection".to_string(),
                duration_ms: 0,
            };
        }

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (check.check_fn)(ctx)
        }));

        match result {
            Ok(check_result) => check_result,
            Err(_) => CheckResult::Fail {
                message: "Check panicked during execution".to_string(),
                details: "An unexpected error occurred".to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
            },
        }
    }
}

/// Create all registered checks with their execution functions
pub fn create_all_checks() -> Vec<RegisteredCheck> {
    vec![
        RegisteredCheck {
            id: "NET-001".to_string(),
            name: "ICMPv4 Connectivity".to_string(),
            category: CheckCategory::Connectivity,
            description: "Workloads on the default interface reach each other over IPv4".to_string(),
            check_fn: Box::new(icmp::run_net001),
        },
        RegisteredCheck {
            id: "NET-002".to_string(),
            name: "ICMPv4 Connectivity (Secondary)".to_string(),
            category: CheckCategory::Connectivity,
            description: "Workloads on each secondary attachment reach each other over IPv4"
                .to_string(),
            check_fn: Box::new(icmp::run_net002),
        },
        RegisteredCheck {
            id: "NET-003".to_string(),
            name: "ICMPv6 Connectivity".to_string(),
            category: CheckCategory::Connectivity,
            description: "Workloads on the default interface reach each other over IPv6".to_string(),
            check_fn: Box::new(icmp::run_net003),
        },
        RegisteredCheck {
            id: "NET-004".to_string(),
            name: "ICMPv6 Connectivity (Secondary)".to_string(),
            category: CheckCategory::Connectivity,
            description: "Workloads on each secondary attachment reach each other over IPv6"
                .to_string(),
            check_fn: Box::new(icmp::run_net004),
        },
        RegisteredCheck {
            id: "NET-005".to_string(),
            name: "Undeclared Container Ports".to_string(),
            category: CheckCategory::Ports,
            description: "Every listening socket is declared as a container port".to_string(),
            check_fn: Box::new(ports::run_net005),
        },
        RegisteredCheck {
            id: "NET-006".to_string(),
            name: "Services Do Not Use NodePort".to_string(),
            category: CheckCategory::Services,
            description: "No service in the target namespaces is of type NodePort".to_string(),
            check_fn: Box::new(services::run_net006),
        },
    ]
}
