//! Declared vs listening port audit (NET-005).
//!
//! Every socket a workload listens on must be declared as a container port
//! somewhere in that workload's spec. Declared ports are unioned across all
//! containers; listening sockets are read once per workload from its first
//! container, since all containers share the network namespace.

use crate::checks::{elapsed_ms, finish, require_targets};
use crate::engine::claims::ClaimsLog;
use crate::engine::context::CheckContext;
use crate::platform::cluster::{Protocol, Workload};
use crate::platform::exec::{exec_checked, RemoteExecutor};
use crate::{CheckResult, NetCheckError, Verdict};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lists listening TCP, UDP and raw sockets, numeric, without a header.
pub const LISTENING_SOCKETS_COMMAND: &str = "ss -tulwnH";

// Column layout of one `ss` line: Netid State Recv-Q Send-Q Local:Port Peer:Port
const INDEX_PROTOCOL: usize = 0;
const INDEX_STATE: usize = 1;
const INDEX_LOCAL: usize = 4;

/// Socket states that mean "accepting traffic" for TCP and UDP respectively.
const LISTENING_STATES: [&str; 2] = ["LISTEN", "UNCONN"];

const ABORTED_AT_DEADLINE: &str = "aborted at deadline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PortKey {
    pub port: u16,
    pub protocol: Protocol,
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// Union of every container's declared ports.
pub fn declared_ports(workload: &Workload) -> BTreeSet<PortKey> {
    workload
        .containers
        .iter()
        .flat_map(|c| c.ports.iter())
        .map(|p| PortKey {
            port: p.container_port,
            protocol: p.protocol,
        })
        .collect()
}

/// Parse one line of socket-listing output.
///
/// Returns `Ok(None)` for lines that do not describe a listening port socket
/// (blank lines, headers, raw sockets, other states) and a parse error for
/// lines that look like one but carry no usable port.
pub fn parse_listening_line(line: &str) -> Result<Option<PortKey>, NetCheckError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= INDEX_LOCAL {
        return Ok(None);
    }
    if !LISTENING_STATES.contains(&fields[INDEX_STATE]) {
        return Ok(None);
    }
    let Some(protocol) = Protocol::from_socket_marker(fields[INDEX_PROTOCOL]) else {
        return Ok(None);
    };

    let local = fields[INDEX_LOCAL];
    let port_text = local
        .rsplit_once(':')
        .map(|(_, port)| port)
        .ok_or_else(|| NetCheckError::Parse {
            context: "socket listing".to_string(),
            message: format!("no port in local address '{}'", local),
        })?;
    let port = port_text.parse::<u16>().map_err(|e| NetCheckError::Parse {
        context: "socket listing".to_string(),
        message: format!("invalid port '{}' in '{}': {}", port_text, local, e),
    })?;

    Ok(Some(PortKey { port, protocol }))
}

/// Parse the whole socket-listing output into a key set.
///
/// Malformed lines are logged and skipped.
pub fn parse_listening(output: &str) -> BTreeSet<PortKey> {
    let mut listening = BTreeSet::new();
    for line in output.lines() {
        match parse_listening_line(line) {
            Ok(Some(key)) => {
                listening.insert(key);
            }
            Ok(None) => {}
            Err(e) => warn!(line, error = %e, "skipping socket listing line"),
        }
    }
    listening
}

/// Listening keys missing from the declared set.
pub fn undeclared_ports(
    listening: &BTreeSet<PortKey>,
    declared: &BTreeSet<PortKey>,
) -> BTreeSet<PortKey> {
    listening.difference(declared).copied().collect()
}

/// Audit result of one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortAudit {
    pub workload: String,
    pub verdict: Verdict,
    /// Listening but undeclared keys; empty unless the verdict is FAIL on a
    /// port violation
    pub undeclared: BTreeSet<PortKey>,
    /// Set when the verdict is FAIL because the listing command failed
    pub execution_error: Option<String>,
}

/// Audit one workload's listening sockets against its declared ports.
pub fn audit_workload(
    workload: &Workload,
    executor: &dyn RemoteExecutor,
    claims: &ClaimsLog,
) -> PortAudit {
    let mut audit = PortAudit {
        workload: workload.id(),
        verdict: Verdict::Skip,
        undeclared: BTreeSet::new(),
        execution_error: None,
    };

    let Some(target) = workload.exec_target() else {
        claims.append(format!("{} has no containers, nothing to audit", workload));
        return audit;
    };

    let declared = declared_ports(workload);
    debug!(workload = %workload.id(), declared = ?declared, "declared ports");

    let output = match exec_checked(executor, LISTENING_SOCKETS_COMMAND, &target) {
        Ok(stdout) => stdout,
        Err(e) => {
            warn!(workload = %workload.id(), error = %e, "socket listing failed");
            claims.append(format!(
                "Failed to execute command {} on {}, err: {}",
                LISTENING_SOCKETS_COMMAND, target, e
            ));
            audit.verdict = Verdict::Fail;
            audit.execution_error = Some(e.to_string());
            return audit;
        }
    };

    let listening = parse_listening(&output);
    if listening.is_empty() {
        claims.append(format!(
            "None of the containers of {} have any listening port.",
            workload
        ));
        return audit;
    }

    let undeclared = undeclared_ports(&listening, &declared);
    for key in &undeclared {
        claims.append(format!(
            "{} is listening on port {} protocol {}, but that port was not declared in any container spec.",
            workload, key.port, key.protocol
        ));
    }

    audit.verdict = if undeclared.is_empty() {
        Verdict::Pass
    } else {
        Verdict::Fail
    };
    audit.undeclared = undeclared;
    audit
}

/// Execute NET-005: Undeclared container ports
pub fn run_net005(ctx: &CheckContext<'_>) -> CheckResult {
    let start = Instant::now();
    finish(start, check_declared_ports(ctx, start))
}

fn check_declared_ports(ctx: &CheckContext<'_>, start: Instant) -> Result<CheckResult, NetCheckError> {
    require_targets(ctx)?;
    info!(workloads = ctx.workloads.len(), "auditing listening ports");

    let mut audits: Vec<PortAudit> = Vec::with_capacity(ctx.workloads.len());
    for workload in &ctx.workloads {
        if ctx.expired() {
            warn!(workload = %workload.id(), "run deadline reached, port audit aborted");
            ctx.claims.append(format!(
                "Port audit of {} aborted at deadline before listing its sockets",
                workload
            ));
            audits.push(PortAudit {
                workload: workload.id(),
                verdict: Verdict::Fail,
                undeclared: BTreeSet::new(),
                execution_error: Some(ABORTED_AT_DEADLINE.to_string()),
            });
            continue;
        }
        audits.push(audit_workload(workload, ctx.executor, &ctx.claims));
    }

    let failed: Vec<&PortAudit> = audits.iter().filter(|a| a.verdict == Verdict::Fail).collect();
    let passed = audits.iter().filter(|a| a.verdict == Verdict::Pass).count();
    let duration_ms = elapsed_ms(start);

    if !failed.is_empty() {
        let details = failed
            .iter()
            .map(|a| match &a.execution_error {
                Some(e) if e == ABORTED_AT_DEADLINE => format!("{}: {}", a.workload, e),
                Some(_) => format!("{}: listing failed", a.workload),
                None => format!(
                    "{}: {}",
                    a.workload,
                    a.undeclared
                        .iter()
                        .map(|k| k.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                ),
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Ok(CheckResult::Fail {
            message: format!(
                "Found {} workloads with listening ports not declared",
                failed.len()
            ),
            details,
            duration_ms,
        });
    }

    if passed == 0 {
        return Err(NetCheckError::ConfigurationMissing {
            what: "No workload has any listening port".to_string(),
        });
    }

    Ok(CheckResult::Pass {
        message: format!(
            "{} workload(s) listen only on declared ports ({} without listening ports)",
            passed,
            audits.len() - passed
        ),
        duration_ms,
    })
}
