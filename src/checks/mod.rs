//! Network conformance checks.
//!
//! - Topology: groups workload endpoints into networks under test
//! - ICMP: reachability inside each network (NET-001 through NET-004)
//! - Ports: listening sockets vs declared container ports (NET-005)
//! - Services: NodePort exposure (NET-006)
//!
//! # Graceful Degradation
//!
//! Check bodies compute `Result<CheckResult, NetCheckError>` and
//! [`finish`] maps the error side:
//! - Nothing eligible (`ConfigurationMissing`): CheckResult::Skip
//! - Any other error: CheckResult::Fail with the error as details
//!
//! Errors on a single workload, network or namespace never abort the
//! iteration over the others; they fail that entity and leave evidence in
//! the claims log.

pub mod icmp;
pub mod ports;
pub mod services;
pub mod topology;

use crate::engine::context::CheckContext;
use crate::engine::orchestrator::create_all_checks;
use crate::{Check, CheckCategory, CheckResult, NetCheckError};
use std::time::Instant;

/// Descriptors of every registered check, without results.
pub fn get_all_checks() -> Vec<Check> {
    create_all_checks()
        .into_iter()
        .map(|c| Check {
            id: c.id,
            name: c.name,
            category: c.category,
            description: c.description,
            result: None,
            claims: Vec::new(),
        })
        .collect()
}

/// Descriptors of the checks in one category.
pub fn get_checks_by_category(category: CheckCategory) -> Vec<Check> {
    get_all_checks()
        .into_iter()
        .filter(|c| c.category == category)
        .collect()
}

/// Map a check body's outcome onto a [`CheckResult`].
pub(crate) fn finish(start: Instant, outcome: Result<CheckResult, NetCheckError>) -> CheckResult {
    match outcome {
        Ok(result) => result,
        Err(NetCheckError::ConfigurationMissing { what }) => CheckResult::Skip { reason: what },
        Err(e) => CheckResult::Fail {
            message: "Check could not complete".to_string(),
            details: e.to_string(),
            duration_ms: elapsed_ms(start),
        },
    }
}

/// Fail with `ConfigurationMissing` when discovery found nothing to test.
pub(crate) fn require_targets(ctx: &CheckContext<'_>) -> Result<(), NetCheckError> {
    if ctx.has_targets() {
        Ok(())
    } else {
        Err(NetCheckError::ConfigurationMissing {
            what: "no workloads with containers under test".to_string(),
        })
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
