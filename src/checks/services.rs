//! Service exposure audit (NET-006).
//!
//! Flags services of type NodePort. Namespaces whose services cannot be
//! listed are a separate failure class; both fail the check.

use crate::checks::{elapsed_ms, finish, require_targets};
use crate::engine::claims::ClaimsLog;
use crate::engine::context::CheckContext;
use crate::platform::cluster::Discovery;
use crate::{CheckResult, NetCheckError};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// A flagged service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ServiceRef {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceAudit {
    /// NodePort services, in listing order
    pub flagged: Vec<ServiceRef>,
    /// Namespaces whose listing failed
    pub failed_namespaces: Vec<String>,
}

impl ServiceAudit {
    pub fn is_clean(&self) -> bool {
        self.flagged.is_empty() && self.failed_namespaces.is_empty()
    }
}

/// List services of every namespace and flag NodePort ones.
pub fn audit_services(
    namespaces: &[String],
    discovery: &dyn Discovery,
    claims: &ClaimsLog,
) -> ServiceAudit {
    let mut audit = ServiceAudit::default();

    for ns in namespaces {
        info!(namespace = %ns, "testing services");
        let services = match discovery.list_services(ns) {
            Ok(services) => services,
            Err(e) => {
                warn!(namespace = %ns, error = %e, "service listing failed");
                claims.append(format!(
                    "Failed to list services on namespace {}, Error: {}",
                    ns, e
                ));
                audit.failed_namespaces.push(ns.clone());
                continue;
            }
        };

        for service in services.iter().filter(|s| s.is_node_port()) {
            claims.append(format!(
                "FAILURE: Service {} (ns {}) type is nodePort",
                service.name, service.namespace
            ));
            audit.flagged.push(ServiceRef {
                namespace: service.namespace.clone(),
                name: service.name.clone(),
            });
        }
    }

    audit
}

/// Execute NET-006: Services do not use NodePort
pub fn run_net006(ctx: &CheckContext<'_>) -> CheckResult {
    let start = Instant::now();
    finish(start, check_node_ports(ctx, start))
}

fn check_node_ports(ctx: &CheckContext<'_>, start: Instant) -> Result<CheckResult, NetCheckError> {
    require_targets(ctx)?;
    if ctx.namespaces.is_empty() {
        return Err(NetCheckError::ConfigurationMissing {
            what: "no target namespaces".to_string(),
        });
    }

    let audit = audit_services(&ctx.namespaces, ctx.discovery, &ctx.claims);
    let duration_ms = elapsed_ms(start);

    if audit.is_clean() {
        return Ok(CheckResult::Pass {
            message: format!(
                "No NodePort services in {} namespace(s)",
                ctx.namespaces.len()
            ),
            duration_ms,
        });
    }

    let flagged = audit
        .flagged
        .iter()
        .map(|s| format!("ns: {}, name: {}", s.namespace, s.name))
        .collect::<Vec<_>>()
        .join("; ");
    Ok(CheckResult::Fail {
        message: format!(
            "Failed to get services on {} namespaces. {} services found of type nodePort.",
            audit.failed_namespaces.len(),
            audit.flagged.len()
        ),
        details: format!(
            "Flagged: {}; unlisted namespaces: {}",
            if flagged.is_empty() { "-".to_string() } else { flagged },
            if audit.failed_namespaces.is_empty() {
                "-".to_string()
            } else {
                audit.failed_namespaces.join(", ")
            }
        ),
        duration_ms,
    })
}
