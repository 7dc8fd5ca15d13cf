//! ICMP connectivity checks (NET-001 through NET-004).
//!
//! For every network under test the first member is the probe source and
//! each other member gets one echo-probe command, run inside the source's
//! network namespace. A destination is reachable iff the command succeeds.
//! One unreachable destination, or one execution error, marks the whole
//! network as failing.
//!
//! Probing is one-directional (source to others). Networks are independent,
//! so they may be probed concurrently; evidence is buffered per network and
//! appended in topology order either way.

use crate::checks::topology::{
    build_topology, AttachmentScope, Endpoint, IpFamily, NetworkId, NetworkUnderTest, Topology,
};
use crate::checks::{elapsed_ms, finish, require_targets};
use crate::engine::claims::ClaimsLog;
use crate::engine::context::{CheckContext, ProbeSettings};
use crate::platform::exec::{exec_checked, RemoteExecutor};
use crate::{CheckResult, NetCheckError};
use serde::Serialize;
use std::net::IpAddr;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Echo requests sent to each destination unless configured otherwise.
pub const DEFAULT_PING_COUNT: u32 = 5;

/// Echo-probe program per address family.
const PROBE_PROGRAMS: [(IpFamily, &str); 2] = [(IpFamily::V4, "ping"), (IpFamily::V6, "ping6")];

/// Build the echo-probe command for one destination.
pub fn probe_command(family: IpFamily, destination: &IpAddr, count: u32) -> String {
    let program = PROBE_PROGRAMS
        .iter()
        .find(|(f, _)| *f == family)
        .map(|(_, p)| *p)
        .unwrap_or("ping");
    format!("{} -c {} {}", program, count, destination)
}

/// Result of probing one destination from a network's source.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub network: NetworkId,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub success: bool,
    /// Command output or error text
    pub evidence: String,
}

/// Network-level verdicts of one prober run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectivityOutcome {
    /// Failing networks, each listed once, in topology order
    pub failing: Vec<NetworkId>,
    /// Every failed probe, for reporting which destinations were unreachable
    pub failed_probes: Vec<ProbeOutcome>,
    /// Networks that were probed
    pub probed: Vec<NetworkId>,
    /// True iff the topology was empty
    pub skip: bool,
}

/// Evidence and verdict of one network, before it is merged into the run.
struct NetworkProbe {
    lines: Vec<String>,
    failed_probes: Vec<ProbeOutcome>,
    failed: bool,
}

/// Probe every network in `topology`.
///
/// Remote execution errors count as failed probes; they never stop the run.
/// If `deadline` passes mid-network the remaining destinations are not
/// probed and the network is reported failing.
pub fn run_connectivity_tests(
    topology: &Topology,
    settings: &ProbeSettings,
    executor: &dyn RemoteExecutor,
    claims: &ClaimsLog,
    deadline: Option<Instant>,
) -> ConnectivityOutcome {
    if topology.is_empty() {
        return ConnectivityOutcome {
            skip: true,
            ..Default::default()
        };
    }

    let probes: Vec<NetworkProbe> = if settings.parallel && settings.max_parallel > 1 {
        probe_parallel(topology.networks(), settings, executor, deadline)
    } else {
        topology
            .networks()
            .iter()
            .map(|net| probe_network(net, settings.count, executor, deadline))
            .collect()
    };

    let mut outcome = ConnectivityOutcome::default();
    for (net, probe) in topology.networks().iter().zip(probes) {
        claims.extend(probe.lines);
        outcome.probed.push(net.id.clone());
        if probe.failed {
            outcome.failing.push(net.id.clone());
        }
        outcome.failed_probes.extend(probe.failed_probes);
    }

    if !outcome.failing.is_empty() {
        debug!(failing = ?outcome.failing, "failed networks");
    }
    outcome
}

/// Probe networks in batches of at most `max_parallel` scoped threads.
fn probe_parallel(
    networks: &[NetworkUnderTest],
    settings: &ProbeSettings,
    executor: &dyn RemoteExecutor,
    deadline: Option<Instant>,
) -> Vec<NetworkProbe> {
    let mut results = Vec::with_capacity(networks.len());

    for batch in networks.chunks(settings.max_parallel) {
        let batch_results: Vec<NetworkProbe> = thread::scope(|s| {
            let handles: Vec<_> = batch
                .iter()
                .map(|net| s.spawn(move || probe_network(net, settings.count, executor, deadline)))
                .collect();

            handles
                .into_iter()
                .zip(batch)
                .map(|(h, net)| {
                    h.join().unwrap_or_else(|_| NetworkProbe {
                        lines: vec![format!("Probing network {} panicked", net.id)],
                        failed_probes: Vec::new(),
                        failed: true,
                    })
                })
                .collect()
        });
        results.extend(batch_results);
    }

    results
}

fn probe_network(
    net: &NetworkUnderTest,
    count: u32,
    executor: &dyn RemoteExecutor,
    deadline: Option<Instant>,
) -> NetworkProbe {
    let mut probe = NetworkProbe {
        lines: Vec::new(),
        failed_probes: Vec::new(),
        failed: false,
    };

    let Some(source) = net.source() else {
        return probe;
    };

    for destination in net.destinations() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            probe.lines.push(format!(
                "Network {}: probing aborted at deadline before {} was reached from {}",
                net.id, destination, source
            ));
            probe.failed = true;
            break;
        }

        let command = probe_command(net.id.family, &destination.ip, count);
        let result = exec_checked(executor, &command, &source.container);

        let (success, evidence) = match result {
            Ok(stdout) => (true, stdout),
            Err(e) => {
                warn!(network = %net.id, source = %source.ip, destination = %destination.ip, error = %e, "probe failed");
                (false, e.to_string())
            }
        };

        debug!(network = %net.id, source = %source.ip, destination = %destination.ip, success, "probe");
        probe.lines.push(format!(
            "{} ping from {} to {} on network {}: {}",
            net.id.family,
            source,
            destination,
            net.id.attachment,
            if success { "reachable" } else { "UNREACHABLE" }
        ));

        if !success {
            probe.failed = true;
            probe.failed_probes.push(ProbeOutcome {
                network: net.id.clone(),
                source: source.clone(),
                destination: destination.clone(),
                success,
                evidence,
            });
        }
    }

    probe
}

/// Execute NET-001: ICMPv4 connectivity on the default interface
pub fn run_net001(ctx: &CheckContext<'_>) -> CheckResult {
    run_connectivity_check(ctx, IpFamily::V4, AttachmentScope::Default)
}

/// Execute NET-002: ICMPv4 connectivity on secondary attachments
pub fn run_net002(ctx: &CheckContext<'_>) -> CheckResult {
    run_connectivity_check(ctx, IpFamily::V4, AttachmentScope::Secondary)
}

/// Execute NET-003: ICMPv6 connectivity on the default interface
pub fn run_net003(ctx: &CheckContext<'_>) -> CheckResult {
    run_connectivity_check(ctx, IpFamily::V6, AttachmentScope::Default)
}

/// Execute NET-004: ICMPv6 connectivity on secondary attachments
pub fn run_net004(ctx: &CheckContext<'_>) -> CheckResult {
    run_connectivity_check(ctx, IpFamily::V6, AttachmentScope::Secondary)
}

fn run_connectivity_check(
    ctx: &CheckContext<'_>,
    family: IpFamily,
    scope: AttachmentScope,
) -> CheckResult {
    let start = Instant::now();
    finish(start, check_connectivity(ctx, family, scope, start))
}

fn check_connectivity(
    ctx: &CheckContext<'_>,
    family: IpFamily,
    scope: AttachmentScope,
    start: Instant,
) -> Result<CheckResult, NetCheckError> {
    require_targets(ctx)?;

    let topology = build_topology(&ctx.workloads, family, scope, &ctx.claims);
    info!(%family, %scope, networks = topology.len(), "probing networks");

    let outcome = run_connectivity_tests(&topology, &ctx.probe, ctx.executor, &ctx.claims, ctx.deadline);
    if outcome.skip {
        return Err(NetCheckError::ConfigurationMissing {
            what: format!("There are no {} {} networks to test", family, scope),
        });
    }

    let duration_ms = elapsed_ms(start);
    if outcome.failing.is_empty() {
        return Ok(CheckResult::Pass {
            message: format!(
                "{} {} network(s) fully reachable over {}",
                outcome.probed.len(),
                scope,
                family
            ),
            duration_ms,
        });
    }

    let unreachable = outcome
        .failed_probes
        .iter()
        .map(|p| format!("{} -> {}", p.source.ip, p.destination.ip))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(CheckResult::Fail {
        message: format!(
            "{} nets failed the {} network {} ping test",
            outcome.failing.len(),
            scope,
            family
        ),
        details: format!(
            "Failing networks: {}; unreachable: {}",
            outcome
                .failing
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            if unreachable.is_empty() { "-".to_string() } else { unreachable }
        ),
        duration_ms,
    })
}
