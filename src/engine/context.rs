//! Per-run check context.
//!
//! Built once per invocation from discovery and handed to every check by
//! reference. Nothing in it outlives the run.

use crate::engine::claims::ClaimsLog;
use crate::platform::cluster::{Discovery, Workload};
use crate::platform::exec::RemoteExecutor;
use crate::NetCheckError;
use std::time::{Duration, Instant};
use tracing::debug;

/// Knobs of the connectivity prober.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Echo requests per destination
    pub count: u32,
    /// Probe independent networks concurrently
    pub parallel: bool,
    /// Networks in flight at once when `parallel` is set
    pub max_parallel: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            count: crate::checks::icmp::DEFAULT_PING_COUNT,
            parallel: false,
            max_parallel: 4,
        }
    }
}

pub struct CheckContext<'a> {
    /// Workloads under test, in discovery order
    pub workloads: Vec<Workload>,
    /// Target namespaces
    pub namespaces: Vec<String>,
    pub discovery: &'a dyn Discovery,
    pub executor: &'a dyn RemoteExecutor,
    pub claims: ClaimsLog,
    pub probe: ProbeSettings,
    /// Run deadline; work not finished by then never reports a pass
    pub deadline: Option<Instant>,
    /// Pod listings that failed during discovery, rendered for the report
    pub discovery_errors: Vec<String>,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        workloads: Vec<Workload>,
        namespaces: Vec<String>,
        discovery: &'a dyn Discovery,
        executor: &'a dyn RemoteExecutor,
        probe: ProbeSettings,
    ) -> Self {
        CheckContext {
            workloads,
            namespaces,
            discovery,
            executor,
            claims: ClaimsLog::new(),
            probe,
            deadline: None,
            discovery_errors: Vec::new(),
        }
    }

    /// Discover workloads and namespaces and start the run clock.
    ///
    /// Partial listing failures are kept in `discovery_errors`; only a
    /// discovery that listed nothing at all is an error. A `timeout_ms` of
    /// zero means no deadline.
    pub fn discover(
        discovery: &'a dyn Discovery,
        executor: &'a dyn RemoteExecutor,
        probe: ProbeSettings,
        timeout_ms: u64,
    ) -> Result<Self, NetCheckError> {
        let listing = discovery.workloads()?;
        let namespaces = discovery.namespaces();
        debug!(
            workloads = listing.workloads.len(),
            failed_listings = listing.failures.len(),
            namespaces = namespaces.len(),
            source = %discovery.source(),
            "discovery complete"
        );

        let mut ctx = Self::new(listing.workloads, namespaces, discovery, executor, probe);
        ctx.discovery_errors = listing.failures.iter().map(|e| e.to_string()).collect();
        if timeout_ms > 0 {
            ctx.deadline = Some(Instant::now() + Duration::from_millis(timeout_ms));
        }
        Ok(ctx)
    }

    /// True once the run deadline has passed.
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// True when at least one workload has a container to test.
    pub fn has_targets(&self) -> bool {
        self.workloads.iter().any(|w| !w.containers.is_empty())
    }
}
