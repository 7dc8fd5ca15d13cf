//! Full run integration tests.
//!
//! Every check driven through `run_checks` against scripted discovery and
//! execution, plus orchestration behavior (fail-fast, deadline, panics).

use crate::mocks::{service, ss_output, workload, MockDiscovery, MockExecutor, Reply, WorkloadExt};
use cnf_netcheck::engine::context::{CheckContext, ProbeSettings};
use cnf_netcheck::engine::orchestrator::{CheckOrchestrator, OrchestratorConfig, RegisteredCheck};
use cnf_netcheck::platform::cluster::Protocol;
use cnf_netcheck::{run_checks, Check, CheckCategory, CheckResult, NetCheckConfig, NetCheckError, Verdict};
use std::time::Duration;

fn only(id: &str) -> NetCheckConfig {
    NetCheckConfig {
        only_checks: vec![id.to_string()],
        ..Default::default()
    }
}

fn run_one(id: &str, discovery: &MockDiscovery, executor: &MockExecutor) -> Check {
    let report = run_checks(only(id), discovery, executor).unwrap();
    assert_eq!(report.checks.len(), 1);
    report.check(id).cloned().unwrap()
}

fn verdict(check: &Check) -> Verdict {
    check.result.as_ref().map(|r| r.verdict()).unwrap()
}

fn message(check: &Check) -> String {
    match check.result.as_ref().unwrap() {
        CheckResult::Pass { message, .. } | CheckResult::Fail { message, .. } => message.clone(),
        CheckResult::Skip { reason } => reason.clone(),
    }
}

fn three_on_default() -> MockDiscovery {
    MockDiscovery::new(vec![
        workload("a").default_ips(&["10.0.0.1", "fd00::1"]),
        workload("b").default_ips(&["10.0.0.2", "fd00::2"]),
        workload("c").default_ips(&["10.0.0.3", "fd00::3"]),
    ])
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

#[test]
fn reachable_default_network_passes_with_one_probe_per_destination() {
    let discovery = three_on_default();
    let executor = MockExecutor::new();

    let check = run_one("NET-001", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Pass);

    let probes = executor.calls_matching("ping -c 5");
    assert_eq!(
        probes,
        vec![
            ("a".to_string(), "ping -c 5 10.0.0.2".to_string()),
            ("a".to_string(), "ping -c 5 10.0.0.3".to_string()),
        ]
    );

    let probe_lines: Vec<_> = check.claims.iter().filter(|l| l.contains("ping from")).collect();
    assert_eq!(probe_lines.len(), 2);
    assert!(check.claims[0].contains("Network default (IPv4) has 3 members"));
}

#[test]
fn unreachable_destination_fails_network_once() {
    let discovery = three_on_default();
    let executor = MockExecutor::new()
        .on("a", "10.0.0.2", Reply::Error("exit status 1".into()))
        .on("a", "10.0.0.3", Reply::Error("exit status 1".into()));

    let check = run_one("NET-001", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Fail);
    assert_eq!(message(&check), "1 nets failed the default network IPv4 ping test");
    assert_eq!(executor.calls().len(), 2);
    assert_eq!(check.claims.iter().filter(|l| l.contains("UNREACHABLE")).count(), 2);
}

#[test]
fn stderr_output_counts_as_unreachable() {
    let discovery = three_on_default();
    let executor = MockExecutor::new().on("*", "10.0.0.3", Reply::Stderr("ping: socket: Operation not permitted".into()));

    let check = run_one("NET-001", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Fail);
    if let Some(CheckResult::Fail { details, .. }) = &check.result {
        assert!(details.contains("10.0.0.1 -> 10.0.0.3"));
    }
}

#[test]
fn ipv6_default_network_uses_ping6() {
    let discovery = three_on_default();
    let executor = MockExecutor::new();

    let check = run_one("NET-003", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Pass);
    assert_eq!(executor.calls_matching("ping6 -c 5 fd00::").len(), 2);
    assert!(executor.calls_matching("ping -c").is_empty());
}

#[test]
fn missing_family_is_skip() {
    let discovery = MockDiscovery::new(vec![
        workload("a").default_ips(&["10.0.0.1"]),
        workload("b").default_ips(&["10.0.0.2"]),
    ]);
    let executor = MockExecutor::new();

    let check = run_one("NET-003", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Skip);
    assert_eq!(message(&check), "There are no IPv6 default networks to test");
    assert!(executor.calls().is_empty());
}

#[test]
fn secondary_networks_fail_independently() {
    let discovery = MockDiscovery::new(vec![
        workload("a").default_ips(&["10.0.0.1"]).secondary("ran", &["192.168.1.1"]).secondary("core", &["192.168.2.1"]),
        workload("b").default_ips(&["10.0.0.2"]).secondary("ran", &["192.168.1.2"]).secondary("core", &["192.168.2.2"]),
        workload("c").secondary("core", &["192.168.2.3"]),
    ]);
    let executor = MockExecutor::new()
        .on("*", "192.168.2.2", Reply::Error("100% packet loss".into()))
        .on("*", "192.168.2.3", Reply::Error("100% packet loss".into()));

    let check = run_one("NET-002", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Fail);
    assert_eq!(message(&check), "1 nets failed the secondary network IPv4 ping test");
    if let Some(CheckResult::Fail { details, .. }) = &check.result {
        assert!(details.contains("core (IPv4)"));
        assert!(!details.contains("ran (IPv4)"));
    }

    // Default addresses are never probed by the secondary check.
    assert!(executor.calls_matching("10.0.0.").is_empty());
    assert_eq!(executor.calls().len(), 3);
}

#[test]
fn single_member_networks_skip() {
    let discovery = MockDiscovery::new(vec![
        workload("a").secondary("ran", &["192.168.1.1"]),
        workload("b").secondary("core", &["192.168.2.1"]),
    ]);
    let executor = MockExecutor::new();

    let check = run_one("NET-002", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Skip);
    assert_eq!(check.claims.iter().filter(|l| l.contains("not enough")).count(), 2);
}

#[test]
fn opted_out_workloads_are_not_probed() {
    let discovery = MockDiscovery::new(vec![
        workload("a").default_ips(&["10.0.0.1"]),
        workload("b").default_ips(&["10.0.0.2"]).opted_out(),
    ]);
    let executor = MockExecutor::new();

    let check = run_one("NET-001", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Skip);
    assert!(executor.calls().is_empty());
}

#[test]
fn ping_count_is_configurable() {
    let discovery = three_on_default();
    let executor = MockExecutor::new();
    let config = NetCheckConfig {
        ping_count: 2,
        ..only("NET-001")
    };

    run_checks(config, &discovery, &executor).unwrap();
    assert_eq!(executor.calls_matching("ping -c 2 ").len(), 2);
}

#[test]
fn parallel_probing_matches_sequential_evidence() {
    let workloads = vec![
        workload("a").secondary("n1", &["192.168.1.1"]).secondary("n2", &["192.168.2.1"]).secondary("n3", &["192.168.3.1"]),
        workload("b").secondary("n1", &["192.168.1.2"]).secondary("n2", &["192.168.2.2"]).secondary("n3", &["192.168.3.2"]),
    ];
    let run = |parallel: bool| {
        let discovery = MockDiscovery::new(workloads.clone());
        let executor = MockExecutor::new().on("*", "192.168.2.2", Reply::Error("timeout".into()));
        let config = NetCheckConfig {
            parallel,
            max_parallel: 2,
            ..only("NET-002")
        };
        run_checks(config, &discovery, &executor).unwrap().check("NET-002").cloned().unwrap()
    };

    let sequential = run(false);
    let parallel = run(true);
    assert_eq!(sequential.claims, parallel.claims);
    assert_eq!(message(&sequential), message(&parallel));
    assert_eq!(message(&parallel), "1 nets failed the secondary network IPv4 ping test");
}

#[test]
fn deadline_mid_network_fails_without_probing_the_rest() {
    let discovery = three_on_default();
    let executor = MockExecutor::new().on("a", "10.0.0.2", Reply::Slow(Duration::from_millis(150)));
    let config = NetCheckConfig {
        timeout_ms: 50,
        ..only("NET-001")
    };

    let report = run_checks(config, &discovery, &executor).unwrap();
    let check = report.check("NET-001").unwrap();
    assert_eq!(verdict(check), Verdict::Fail);
    assert!(check.claims.iter().any(|l| l.contains("aborted at deadline")));
    assert!(executor.calls_matching("10.0.0.3").is_empty());
}

// ---------------------------------------------------------------------------
// Declared ports
// ---------------------------------------------------------------------------

#[test]
fn undeclared_listening_port_fails() {
    let discovery = MockDiscovery::new(vec![workload("a").ports(&[(8080, Protocol::Tcp)])]);
    let executor = MockExecutor::new().on(
        "a",
        "ss -tulwnH",
        Reply::Stdout(ss_output(&[(8080, Protocol::Tcp), (9090, Protocol::Tcp)])),
    );

    let check = run_one("NET-005", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Fail);
    assert_eq!(message(&check), "Found 1 workloads with listening ports not declared");
    assert_eq!(check.claims.len(), 1);
    assert!(check.claims[0].contains("listening on port 9090 protocol TCP"));
}

#[test]
fn deadline_during_port_audit_fails_remaining_workloads() {
    let discovery = MockDiscovery::new(vec![workload("a"), workload("b"), workload("c")]);
    let executor = MockExecutor::new()
        .on("a", "ss -tulwnH", Reply::Slow(Duration::from_millis(150)))
        .on("*", "ss -tulwnH", Reply::Stdout(String::new()));
    let config = NetCheckConfig {
        timeout_ms: 50,
        ..only("NET-005")
    };

    let report = run_checks(config, &discovery, &executor).unwrap();
    let check = report.check("NET-005").unwrap();
    assert_eq!(verdict(check), Verdict::Fail);
    assert_eq!(executor.calls_matching("ss -tulwnH").len(), 1);
    assert_eq!(
        check.claims.iter().filter(|l| l.contains("aborted at deadline")).count(),
        2
    );
    match check.result.as_ref().unwrap() {
        CheckResult::Fail { details, .. } => {
            assert!(details.contains("ns1/b: aborted at deadline"));
            assert!(details.contains("ns1/c: aborted at deadline"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn declared_ports_union_across_containers() {
    let mut w = workload("a").ports(&[(8080, Protocol::Tcp)]);
    let mut sidecar = w.containers[0].clone();
    sidecar.name = "sidecar".into();
    sidecar.ports[0].container_port = 53;
    sidecar.ports[0].protocol = Protocol::Udp;
    w.containers.push(sidecar);

    let discovery = MockDiscovery::new(vec![w]);
    let executor = MockExecutor::new().on(
        "a",
        "ss",
        Reply::Stdout(ss_output(&[(8080, Protocol::Tcp), (53, Protocol::Udp)])),
    );

    let check = run_one("NET-005", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Pass);
    // Listing runs once per workload, not per container.
    assert_eq!(executor.calls().len(), 1);
}

#[test]
fn protocol_is_part_of_the_port_key() {
    let discovery = MockDiscovery::new(vec![workload("a").ports(&[(53, Protocol::Tcp)])]);
    let executor = MockExecutor::new().on("a", "ss", Reply::Stdout(ss_output(&[(53, Protocol::Udp)])));

    let check = run_one("NET-005", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Fail);
    assert!(check.claims[0].contains("port 53 protocol UDP"));
}

#[test]
fn listing_error_fails_workload_and_audit_continues() {
    let discovery = MockDiscovery::new(vec![
        workload("a").ports(&[(80, Protocol::Tcp)]),
        workload("b").ports(&[(80, Protocol::Tcp)]),
    ]);
    let executor = MockExecutor::new()
        .on("a", "ss", Reply::Error("container not running".into()))
        .on("b", "ss", Reply::Stdout(ss_output(&[(80, Protocol::Tcp)])));

    let check = run_one("NET-005", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Fail);
    assert_eq!(message(&check), "Found 1 workloads with listening ports not declared");
    assert_eq!(executor.calls_matching("ss -tulwnH").len(), 2);
    assert!(check.claims[0].starts_with("Failed to execute command ss -tulwnH"));
}

#[test]
fn stderr_from_listing_fails_workload() {
    let discovery = MockDiscovery::new(vec![workload("a")]);
    let executor = MockExecutor::new().on("a", "ss", Reply::Stderr("sh: ss: not found".into()));

    let check = run_one("NET-005", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Fail);
}

#[test]
fn no_listening_ports_anywhere_is_skip() {
    let discovery = MockDiscovery::new(vec![workload("a"), workload("b").without_containers()]);
    let executor = MockExecutor::new();

    let check = run_one("NET-005", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Skip);
    assert!(check.claims.iter().any(|l| l.contains("have any listening port")));
}

#[test]
fn workload_without_containers_does_not_fail_the_audit() {
    let discovery = MockDiscovery::new(vec![
        workload("a").ports(&[(80, Protocol::Tcp)]),
        workload("b").without_containers(),
    ]);
    let executor = MockExecutor::new().on("a", "ss", Reply::Stdout(ss_output(&[(80, Protocol::Tcp)])));

    let check = run_one("NET-005", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Pass);
    assert_eq!(executor.calls().len(), 1);
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

#[test]
fn node_port_and_listing_failure_both_fail() {
    let discovery = MockDiscovery::new(vec![workload("a")])
        .with_namespaces(&["ns1", "ns2"])
        .with_listing_error("ns1", "forbidden")
        .with_services("ns2", vec![service("ns2", "web", "NodePort"), service("ns2", "db", "ClusterIP")]);
    let executor = MockExecutor::new();

    let check = run_one("NET-006", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Fail);
    assert_eq!(
        message(&check),
        "Failed to get services on 1 namespaces. 1 services found of type nodePort."
    );
    assert_eq!(check.claims.len(), 2);
    assert!(check.claims[0].contains("Failed to list services on namespace ns1"));
    assert!(check.claims[1].contains("Service web (ns ns2) type is nodePort"));
}

#[test]
fn cluster_ip_services_pass() {
    let discovery = MockDiscovery::new(vec![workload("a")])
        .with_services("ns1", vec![service("ns1", "web", "ClusterIP"), service("ns1", "lb", "LoadBalancer")]);
    let executor = MockExecutor::new();

    let check = run_one("NET-006", &discovery, &executor);
    assert_eq!(verdict(&check), Verdict::Pass);
    assert!(check.claims.is_empty());
}

#[test]
fn no_namespaces_is_skip() {
    let discovery = MockDiscovery::new(vec![workload("a")]).with_namespaces(&[]);
    let check = run_one("NET-006", &discovery, &MockExecutor::new());
    assert_eq!(verdict(&check), Verdict::Skip);
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

#[test]
fn empty_cluster_skips_every_check() {
    let discovery = MockDiscovery::new(vec![]);
    let executor = MockExecutor::new();

    let report = run_checks(NetCheckConfig::default(), &discovery, &executor).unwrap();
    let summary = report.summary();
    assert_eq!(summary.total, 6);
    assert_eq!(summary.skipped, 6);
    assert!(executor.calls().is_empty());
    assert_eq!(report.source, "mock");
}

#[test]
fn failed_pod_listing_in_one_namespace_keeps_the_rest() {
    let mut stray = workload("x").default_ips(&["10.0.9.9"]);
    stray.namespace = "restricted".to_string();
    let mut workloads = three_on_default().workloads;
    workloads.push(stray);

    let discovery = MockDiscovery::new(workloads)
        .with_namespaces(&["ns1", "restricted"])
        .with_pod_listing_error("restricted", "Error from server (Forbidden)");
    let executor = MockExecutor::new();

    let report = run_checks(only("NET-001"), &discovery, &executor).unwrap();
    assert_eq!(verdict(report.check("NET-001").unwrap()), Verdict::Pass);
    assert_eq!(executor.calls_matching("ping").len(), 2);
    assert!(executor.calls_matching("10.0.9.9").is_empty());

    assert_eq!(report.discovery_errors.len(), 1);
    assert!(report.discovery_errors[0].contains("pods in namespace restricted"));
    assert!(report.discovery_errors[0].contains("Forbidden"));
}

#[test]
fn every_pod_listing_failing_aborts_run() {
    let discovery =
        MockDiscovery::new(vec![workload("a")]).with_pod_listing_error("ns1", "forbidden");

    let err = run_checks(NetCheckConfig::default(), &discovery, &MockExecutor::new()).unwrap_err();
    assert!(matches!(err, NetCheckError::Listing { namespace, .. } if namespace == "ns1"));
}

#[test]
fn fail_fast_stops_after_first_failure() {
    let discovery = three_on_default();
    let executor = MockExecutor::new().on("*", "10.0.0.2", Reply::Error("unreachable".into()));
    let config = NetCheckConfig {
        fail_fast: true,
        ..Default::default()
    };

    let report = run_checks(config, &discovery, &executor).unwrap();
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].id, "NET-001");
}

#[test]
fn category_selection_runs_only_that_category() {
    let discovery = three_on_default();
    let config = NetCheckConfig {
        categories: Some(vec![CheckCategory::Services]),
        ..Default::default()
    };

    let report = run_checks(config, &discovery, &MockExecutor::new()).unwrap();
    let ids: Vec<_> = report.checks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["NET-006"]);
}

#[test]
fn claims_are_attached_to_the_check_that_wrote_them() {
    let discovery = three_on_default().with_services("ns1", vec![service("ns1", "web", "NodePort")]);
    let report = run_checks(NetCheckConfig::default(), &discovery, &MockExecutor::new()).unwrap();

    let net006 = report.check("NET-006").unwrap();
    assert_eq!(net006.claims.len(), 1);
    assert!(report
        .check("NET-001")
        .unwrap()
        .claims
        .iter()
        .all(|l| !l.contains("nodePort")));
    assert_eq!(report.claims().count(), report.checks.iter().map(|c| c.claims.len()).sum::<usize>());
}

#[test]
fn panicking_check_becomes_failure() {
    let discovery = MockDiscovery::new(vec![]);
    let executor = MockExecutor::new();
    let ctx = CheckContext::new(vec![], vec![], &discovery, &executor, ProbeSettings::default());

    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig::default());
    orchestrator.register_check(RegisteredCheck {
        id: "T-001".into(),
        name: "Panics".into(),
        category: CheckCategory::Ports,
        description: String::new(),
        check_fn: Box::new(|_: &CheckContext<'_>| -> CheckResult { panic!("boom") }),
    });
    orchestrator.register_check(RegisteredCheck {
        id: "T-002".into(),
        name: "Passes".into(),
        category: CheckCategory::Ports,
        description: String::new(),
        check_fn: Box::new(|ctx: &CheckContext<'_>| {
            ctx.claims.append("ran");
            CheckResult::Pass {
                message: "ok".into(),
                duration_ms: 0,
            }
        }),
    });

    let report = orchestrator.run_all(&ctx);
    assert!(matches!(report.checks[0].result, Some(CheckResult::Fail { .. })));
    assert!(matches!(report.checks[1].result, Some(CheckResult::Pass { .. })));
    assert_eq!(report.checks[1].claims, vec!["ran".to_string()]);
}
