//! Output formatting tests.
//!
//! Tests for terminal, JSON, and JUnit XML output formatters.

use cnf_netcheck::cli::args::OutputFormat;
use cnf_netcheck::cli::output::{get_formatter, JsonFormatter, JunitFormatter, OutputFormatter, TerminalFormatter};
use cnf_netcheck::engine::result::ValidationReport;
use cnf_netcheck::{Check, CheckCategory, CheckResult};

fn create_sample_report() -> ValidationReport {
    ValidationReport {
        timestamp: 1733500000,
        source: "kubectl:lab".to_string(),
        checks: vec![
            Check {
                id: "NET-001".to_string(),
                name: "ICMPv4 Connectivity".to_string(),
                category: CheckCategory::Connectivity,
                description: "Default interface IPv4 reachability".to_string(),
                result: Some(CheckResult::Pass {
                    message: "1 default network(s) fully reachable over IPv4".to_string(),
                    duration_ms: 120,
                }),
                claims: vec![
                    "Network default (IPv4) has 2 members [10.0.0.1 (ns1/a), 10.0.0.2 (ns1/b)]".to_string(),
                    "IPv4 ping from 10.0.0.1 (ns1/a) to 10.0.0.2 (ns1/b) on network default: reachable".to_string(),
                ],
            },
            Check {
                id: "NET-005".to_string(),
                name: "Undeclared Container Ports".to_string(),
                category: CheckCategory::Ports,
                description: "Listening sockets are declared".to_string(),
                result: Some(CheckResult::Fail {
                    message: "Found 1 workloads with listening ports not declared".to_string(),
                    details: "ns1/a: 9090/TCP".to_string(),
                    duration_ms: 40,
                }),
                claims: vec![
                    "workload: a ns: ns1 is listening on port 9090 protocol TCP, but that port was not declared in any container spec.".to_string(),
                ],
            },
            Check {
                id: "NET-006".to_string(),
                name: "Services Do Not Use NodePort".to_string(),
                category: CheckCategory::Services,
                description: "No NodePort services".to_string(),
                result: Some(CheckResult::Skip {
                    reason: "no target namespaces".to_string(),
                }),
                claims: vec![],
            },
        ],
        total_duration_ms: 160,
        discovery_errors: vec![],
    }
}

#[test]
fn test_terminal_formatter_plain() {
    let output = TerminalFormatter::new(false, false, false).format(&create_sample_report());

    assert!(output.contains("cnf-netcheck report"));
    assert!(output.contains("Source: kubectl:lab"));
    assert!(output.contains("Timestamp: 2024-12-06T15:46:40Z"));
    assert!(output.contains("CONNECTIVITY CHECKS"));
    assert!(output.contains("[PASS] NET-001: ICMPv4 Connectivity"));
    assert!(output.contains("[FAIL] NET-005"));
    assert!(output.contains("[SKIP] NET-006"));
    assert!(output.contains("SUMMARY: 1 passed, 1 failed, 1 skipped"));
    assert!(output.contains("Exit code: 1"));
    assert!(!output.contains("\x1b["));
    assert!(!output.contains("ping from"));
}

#[test]
fn test_terminal_formatter_color() {
    let output = TerminalFormatter::new(true, false, false).format(&create_sample_report());
    assert!(output.contains("\x1b[32m[PASS]\x1b[0m"));
    assert!(output.contains("\x1b[31m[FAIL]\x1b[0m"));
}

#[test]
fn test_terminal_formatter_verbose_shows_claims() {
    let output = TerminalFormatter::new(false, true, false).format(&create_sample_report());
    assert!(output.contains("ping from 10.0.0.1 (ns1/a) to 10.0.0.2 (ns1/b)"));
    assert!(output.contains("ns1/a: 9090/TCP"));
    assert!(output.contains("(120ms)"));
}

#[test]
fn test_terminal_formatter_quiet() {
    let output = TerminalFormatter::new(false, false, true).format(&create_sample_report());
    assert!(!output.contains("NET-001"));
    assert!(!output.contains("NET-006"));
    assert!(output.contains("NET-005"));
    assert!(!output.contains("CONNECTIVITY CHECKS"));
}

#[test]
fn test_json_formatter() {
    let output = JsonFormatter::new(true).format(&create_sample_report());
    let doc: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(doc["source"], "kubectl:lab");
    assert_eq!(doc["timestamp"], "2024-12-06T15:46:40Z");
    assert_eq!(doc["summary"]["passed"], 1);
    assert_eq!(doc["summary"]["failed"], 1);
    assert_eq!(doc["summary"]["skipped"], 1);
    assert_eq!(doc["checks"][0]["result"]["status"], "pass");
    assert_eq!(doc["checks"][1]["result"]["status"], "fail");
    assert_eq!(doc["checks"][1]["result"]["details"], "ns1/a: 9090/TCP");
    assert_eq!(doc["checks"][2]["result"]["reason"], "no target namespaces");
    assert_eq!(doc["checks"][0]["claims"].as_array().unwrap().len(), 2);
    assert_eq!(doc["checks"][0]["category"], "Connectivity");
}

#[test]
fn test_json_formatter_compact() {
    let output = JsonFormatter::new(false).format(&create_sample_report());
    assert!(!output.contains('\n'));
    assert!(serde_json::from_str::<serde_json::Value>(&output).is_ok());
}

#[test]
fn test_junit_formatter() {
    let output = JunitFormatter::new().format(&create_sample_report());

    assert!(output.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(output.contains("<testsuites name=\"cnf-netcheck\" tests=\"3\" failures=\"1\" errors=\"0\" skipped=\"1\""));
    assert!(output.contains("<testsuite name=\"connectivity\""));
    assert!(output.contains("<testsuite name=\"ports\""));
    assert!(output.contains("classname=\"cnf-netcheck.ports\""));
    assert!(output.contains("<failure message=\"Found 1 workloads with listening ports not declared\">"));
    assert!(output.contains("<skipped message=\"no target namespaces\" />"));
    assert!(output.contains("<system-out>1 default network(s) fully reachable over IPv4\nNetwork default (IPv4)"));
    assert!(output.ends_with("</testsuites>"));
}

#[test]
fn test_junit_escapes_claims() {
    let mut report = create_sample_report();
    report.checks[1].claims = vec!["<bad> & \"quoted\"".to_string()];
    let output = JunitFormatter::new().format(&report);
    assert!(output.contains("&lt;bad&gt; &amp; &quot;quoted&quot;"));
}

#[test]
fn test_discovery_errors_are_reported() {
    let mut report = create_sample_report();
    report.discovery_errors =
        vec!["Failed to list pods in namespace restricted: forbidden".to_string()];

    let text = TerminalFormatter::new(false, false, true).format(&report);
    assert!(text.contains("DISCOVERY ERRORS\n  Failed to list pods in namespace restricted: forbidden"));

    let doc: serde_json::Value =
        serde_json::from_str(&JsonFormatter::new(false).format(&report)).unwrap();
    assert_eq!(doc["discovery_errors"][0], "Failed to list pods in namespace restricted: forbidden");

    let clean = TerminalFormatter::new(false, false, false).format(&create_sample_report());
    assert!(!clean.contains("DISCOVERY ERRORS"));
}

#[test]
fn test_empty_report_is_valid() {
    let report = ValidationReport::new();
    for format in [OutputFormat::Text, OutputFormat::Json, OutputFormat::Junit] {
        let output = get_formatter(format, true, false, false).format(&report);
        assert!(!output.is_empty());
    }

    let json = JsonFormatter::new(true).format(&report);
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(doc["summary"]["total"], 0);

    let xml = JunitFormatter::new().format(&report);
    assert!(xml.contains("tests=\"0\""));
    assert!(!xml.contains("<testsuite "));
}
