//! cnf-netcheck library
//!
//! Network conformance checks for workloads running in a cluster.
//!
//! This library provides:
//! - ICMP reachability checks between workload endpoints, per address family,
//!   on the default interface and on secondary (multi-homed) attachments
//! - An audit of listening sockets against the ports each workload declares
//! - An audit of services exposed through externally-routable node ports
//! - An append-only claims log carrying the evidence behind every verdict
//!
//! # Example
//!
//! ```no_run
//! use cnf_netcheck::platform::kubectl::{Kubectl, KubectlDiscovery, KubectlExecutor};
//! use cnf_netcheck::{run_checks, NetCheckConfig};
//!
//! let kubectl = Kubectl::default();
//! let discovery = KubectlDiscovery::new(kubectl.clone(), vec!["prod".into()], vec![]);
//! let executor = KubectlExecutor::new(kubectl);
//!
//! let report = run_checks(NetCheckConfig::default(), &discovery, &executor)
//!     .expect("discovery failed");
//! println!("Checks failed: {}", report.summary().failed);
//! ```

pub mod checks;
pub mod cli;
pub mod config;
pub mod engine;
pub mod platform;
pub mod version;

use cli::args::{Args, CategoryFilter};
use engine::context::{CheckContext, ProbeSettings};
use engine::orchestrator::{create_all_checks, CheckOrchestrator, OrchestratorConfig};
use engine::result::ValidationReport;
use platform::cluster::Discovery;
use platform::exec::RemoteExecutor;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// Re-exports for public API
pub use engine::claims::ClaimsLog;
pub use engine::orchestrator::CheckOrchestrator as Orchestrator;
pub use engine::result::{ResultSummary, ValidationReport as Report};

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CheckResult {
    /// Every entity in scope passed
    Pass { message: String, duration_ms: u64 },
    /// At least one entity in scope failed
    Fail {
        message: String,
        details: String,
        duration_ms: u64,
    },
    /// Nothing eligible to check
    Skip { reason: String },
}

impl CheckResult {
    pub fn verdict(&self) -> Verdict {
        match self {
            CheckResult::Pass { .. } => Verdict::Pass,
            CheckResult::Fail { .. } => Verdict::Fail,
            CheckResult::Skip { .. } => Verdict::Skip,
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckResult::Pass { message, .. } => write!(f, "PASS: {}", message),
            CheckResult::Fail { message, details, .. } => {
                write!(f, "FAIL: {} ({})", message, details)
            }
            CheckResult::Skip { reason } => write!(f, "SKIP: {}", reason),
        }
    }
}

/// Tri-state verdict for a single checked entity (workload, network).
///
/// `Skip` means the entity was structurally ineligible. Errors while checking
/// an entity are always `Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Skip => write!(f, "SKIP"),
        }
    }
}

/// Check category for grouping related checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CheckCategory {
    /// ICMP reachability between workload endpoints
    Connectivity,
    /// Declared vs listening container ports
    Ports,
    /// Service exposure
    Services,
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckCategory::Connectivity => write!(f, "Connectivity"),
            CheckCategory::Ports => write!(f, "Ports"),
            CheckCategory::Services => write!(f, "Services"),
        }
    }
}

/// A check with its result and the evidence it recorded.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    /// Unique identifier (e.g., "NET-001")
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub category: CheckCategory,
    pub description: String,
    /// Result of the check (None if not yet executed)
    pub result: Option<CheckResult>,
    /// Claims log lines appended while this check ran
    pub claims: Vec<String>,
}

/// Error types for cnf-netcheck operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetCheckError {
    /// Remote command could not be launched, exited non-zero or wrote to stderr
    #[error("Command '{command}' failed on {target}: {message}")]
    RemoteExecution {
        command: String,
        target: String,
        message: String,
    },
    /// A discovery call failed
    #[error("Failed to list {resource} in namespace {namespace}: {message}")]
    Listing {
        resource: String,
        namespace: String,
        message: String,
    },
    /// Malformed input (socket listing line, kubectl JSON, ...)
    #[error("Parse error in {context}: {message}")]
    Parse { context: String, message: String },
    /// Nothing eligible to check; reported as a skip, never a failure
    #[error("Nothing to check: {what}")]
    ConfigurationMissing { what: String },
    #[error("I/O error in {context}: {message}")]
    Io { context: String, message: String },
    #[error("Invalid configuration in {origin}: {message}")]
    Config { origin: String, message: String },
}

/// Configuration for a check run.
#[derive(Debug, Clone)]
pub struct NetCheckConfig {
    /// Categories to run (None = all)
    pub categories: Option<Vec<CheckCategory>>,
    /// Specific checks to skip (by ID)
    pub skip_checks: Vec<String>,
    /// Specific checks to run (by ID)
    pub only_checks: Vec<String>,
    /// Stop on first failure
    pub fail_fast: bool,
    /// Overall run time limit in milliseconds (0 disables it)
    pub timeout_ms: u64,
    /// Probe independent networks concurrently
    pub parallel: bool,
    /// Upper bound on networks probed at once when `parallel` is set
    pub max_parallel: usize,
    /// Echo requests sent per destination
    pub ping_count: u32,
}

impl Default for NetCheckConfig {
    fn default() -> Self {
        NetCheckConfig {
            categories: None,
            skip_checks: Vec::new(),
            only_checks: Vec::new(),
            fail_fast: false,
            timeout_ms: 600_000,
            parallel: false,
            max_parallel: 4,
            ping_count: checks::icmp::DEFAULT_PING_COUNT,
        }
    }
}

impl NetCheckConfig {
    /// Create configuration from command line arguments.
    ///
    /// `file_ping_count` comes from the configuration file and is overridden
    /// by `--ping-count`.
    pub fn from_args(args: &Args, file_ping_count: Option<u32>) -> Self {
        let categories = match args.category {
            CategoryFilter::All => None,
            CategoryFilter::Connectivity => Some(vec![CheckCategory::Connectivity]),
            CategoryFilter::Ports => Some(vec![CheckCategory::Ports]),
            CategoryFilter::Services => Some(vec![CheckCategory::Services]),
        };

        NetCheckConfig {
            categories,
            skip_checks: args.skip.clone(),
            only_checks: args.only.clone(),
            fail_fast: args.fail_fast,
            timeout_ms: args.timeout_ms,
            parallel: args.parallel,
            max_parallel: args.max_parallel.max(1),
            ping_count: args
                .ping_count
                .or(file_ping_count)
                .unwrap_or(checks::icmp::DEFAULT_PING_COUNT),
        }
    }
}

/// Run the network conformance checks.
///
/// Discovers workloads once through `discovery`, builds a fresh
/// [`CheckContext`] and evaluates the selected checks in registration order.
/// Only a discovery where every pod listing failed is returned as an error.
/// Partial listing failures land in the report's `discovery_errors`, and
/// everything that goes wrong inside a check becomes that check's `Fail`
/// result.
pub fn run_checks(
    config: NetCheckConfig,
    discovery: &dyn Discovery,
    executor: &dyn RemoteExecutor,
) -> Result<ValidationReport, NetCheckError> {
    let probe = ProbeSettings {
        count: config.ping_count,
        parallel: config.parallel,
        max_parallel: config.max_parallel,
    };
    let ctx = CheckContext::discover(discovery, executor, probe, config.timeout_ms)?;

    let mut orchestrator = CheckOrchestrator::new(OrchestratorConfig {
        fail_fast: config.fail_fast,
    });
    orchestrator.register_checks(create_all_checks());

    let report = if !config.only_checks.is_empty() {
        orchestrator.run_specific(&ctx, &config.only_checks)
    } else if !config.skip_checks.is_empty() {
        orchestrator.run_excluding(&ctx, &config.skip_checks)
    } else if let Some(ref categories) = config.categories {
        if categories.is_empty() {
            orchestrator.run_all(&ctx)
        } else {
            orchestrator.run_categories(&ctx, categories)
        }
    } else {
        orchestrator.run_all(&ctx)
    };

    Ok(report)
}
