//! Topology builder: groups workload endpoints into networks under test.
//!
//! A network under test is identified by an attachment name and an address
//! family. The primary interface of every workload maps to the fixed
//! [`DEFAULT_NETWORK`] attachment; secondary attachments keep their own name.
//!
//! Ordering is part of the contract: networks appear in the order they were
//! first seen and members in discovery order, so the prober always picks the
//! same source endpoint for the same input.

use crate::engine::claims::ClaimsLog;
use crate::platform::cluster::{ContainerRef, Workload};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, warn};

pub use crate::platform::cluster::DEFAULT_NETWORK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpFamily::V4,
            IpAddr::V6(_) => IpFamily::V6,
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpFamily::V4 => write!(f, "IPv4"),
            IpFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// Which interfaces of a workload take part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttachmentScope {
    /// Primary interface only
    Default,
    /// Secondary (multi-homed) attachments only
    Secondary,
}

impl fmt::Display for AttachmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentScope::Default => write!(f, "default"),
            AttachmentScope::Secondary => write!(f, "secondary"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NetworkId {
    pub attachment: String,
    pub family: IpFamily,
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.attachment, self.family)
    }
}

/// One workload address on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// `namespace/name` of the owning workload
    pub workload: String,
    /// Container remote commands run in
    pub container: ContainerRef,
    pub ip: IpAddr,
    pub family: IpFamily,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.ip, self.workload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkUnderTest {
    pub id: NetworkId,
    /// Distinct addresses, discovery order
    pub members: Vec<Endpoint>,
}

impl NetworkUnderTest {
    /// The endpoint every probe on this network originates from.
    pub fn source(&self) -> Option<&Endpoint> {
        self.members.first()
    }

    /// Every member except the source.
    pub fn destinations(&self) -> &[Endpoint] {
        self.members.get(1..).unwrap_or(&[])
    }
}

/// Networks eligible for probing. Every member set has at least two endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topology {
    networks: Vec<NetworkUnderTest>,
}

impl Topology {
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn networks(&self) -> &[NetworkUnderTest] {
        &self.networks
    }

    pub fn get(&self, id: &NetworkId) -> Option<&NetworkUnderTest> {
        self.networks.iter().find(|n| &n.id == id)
    }
}

/// Build the networks under test for one family and attachment scope.
///
/// Networks with fewer than two distinct addresses are dropped. An empty
/// result means "no eligible networks", which callers report as a skip.
/// One summary line per discovered network goes to `claims`.
pub fn build_topology(
    workloads: &[Workload],
    family: IpFamily,
    scope: AttachmentScope,
    claims: &ClaimsLog,
) -> Topology {
    let mut discovered: Vec<NetworkUnderTest> = Vec::new();

    for workload in workloads {
        if workload.skip_connectivity_tests {
            claims.append(format!(
                "Skipping {} because it is excluded from connectivity tests",
                workload
            ));
            continue;
        }

        let Some(container) = workload.exec_target() else {
            warn!(workload = %workload.id(), "workload has no containers, no probe source");
            claims.append(format!("Skipping {}: no containers to probe from", workload));
            continue;
        };

        let qualifying = workload.interfaces.iter().filter(|iface| match scope {
            AttachmentScope::Default => iface.default,
            AttachmentScope::Secondary => !iface.default,
        });

        for iface in qualifying {
            let attachment = match scope {
                AttachmentScope::Default => DEFAULT_NETWORK.to_string(),
                AttachmentScope::Secondary => iface.name.clone(),
            };
            let id = NetworkId {
                attachment,
                family,
            };

            for ip in iface.ips.iter().filter(|ip| IpFamily::of(ip) == family) {
                let endpoint = Endpoint {
                    workload: workload.id(),
                    container: container.clone(),
                    ip: *ip,
                    family,
                };
                add_member(&mut discovered, &id, endpoint);
            }
        }
    }

    let mut networks = Vec::with_capacity(discovered.len());
    for net in discovered {
        let members = net
            .members
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        if net.members.len() < 2 {
            claims.append(format!(
                "Network {} has {} member(s) [{}], not enough to test connectivity",
                net.id,
                net.members.len(),
                members
            ));
            debug!(network = %net.id, "dropping network with fewer than 2 members");
            continue;
        }

        claims.append(format!(
            "Network {} has {} members [{}]",
            net.id,
            net.members.len(),
            members
        ));
        networks.push(net);
    }

    Topology { networks }
}

fn add_member(networks: &mut Vec<NetworkUnderTest>, id: &NetworkId, endpoint: Endpoint) {
    match networks.iter_mut().find(|n| &n.id == id) {
        Some(net) => {
            if net.members.iter().all(|m| m.ip != endpoint.ip) {
                net.members.push(endpoint);
            }
        }
        None => networks.push(NetworkUnderTest {
            id: id.clone(),
            members: vec![endpoint],
        }),
    }
}
