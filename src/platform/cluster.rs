//! Cluster object model and the discovery interface.
//!
//! Discovery is read-only. Every call may fail independently; callers that
//! iterate over namespaces accumulate listing errors instead of aborting.

use crate::NetCheckError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Service type that exposes a port on every node.
pub const NODE_PORT: &str = "NodePort";

/// Attachment name of a workload's primary interface.
pub const DEFAULT_NETWORK: &str = "default";

/// Transport protocol of a declared or listening port.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// Cluster default when a port omits its protocol
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    /// Map a socket-listing transport marker to a protocol.
    ///
    /// Returns None for markers that do not carry a port (raw, unix).
    pub fn from_socket_marker(marker: &str) -> Option<Self> {
        match marker.to_ascii_lowercase().as_str() {
            "tcp" | "tcp6" | "stream" => Some(Protocol::Tcp),
            "udp" | "udp6" | "dgram" | "datagram" => Some(Protocol::Udp),
            "sctp" | "sctp6" | "seqpacket" => Some(Protocol::Sctp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Sctp => "SCTP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port declared in a container spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

/// One network attachment of a workload.
///
/// The shape matches a multus network-status entry, so the annotation decodes
/// straight into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Attachment (network) name
    pub name: String,
    /// Interface name inside the workload, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default)]
    pub ips: Vec<IpAddr>,
    /// Primary interface of the workload
    #[serde(default)]
    pub default: bool,
}

/// A set of containers scheduled together and sharing one network namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
    /// Opt-out marker: contributes no endpoints to connectivity checks
    #[serde(default)]
    pub skip_connectivity_tests: bool,
}

impl Workload {
    /// Stable identifier, `namespace/name`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// The container every remote command for this workload runs in.
    ///
    /// Always the first container in spec order: all containers share the
    /// workload's network namespace.
    pub fn exec_target(&self) -> Option<ContainerRef> {
        self.containers.first().map(|c| ContainerRef {
            namespace: self.namespace.clone(),
            workload: self.name.clone(),
            container: c.name.clone(),
        })
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workload: {} ns: {}", self.name, self.namespace)
    }
}

/// Identity of one container, the target of remote execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContainerRef {
    pub namespace: String,
    pub workload: String,
    pub container: String,
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "container: {} workload: {} ns: {}",
            self.container, self.workload, self.namespace
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub service_type: String,
}

impl Service {
    /// Exact match on the NodePort type, no normalization.
    pub fn is_node_port(&self) -> bool {
        self.service_type == NODE_PORT
    }
}

/// Workloads found by discovery and the pod listings that failed on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkloadListing {
    /// Workloads under test, in discovery order
    pub workloads: Vec<Workload>,
    /// Listings that failed; the remaining ones were still collected
    pub failures: Vec<NetCheckError>,
}

impl WorkloadListing {
    /// A listing where every lookup succeeded.
    pub fn complete(workloads: Vec<Workload>) -> Self {
        WorkloadListing {
            workloads,
            failures: Vec::new(),
        }
    }
}

/// Source of cluster objects under test.
pub trait Discovery: Send + Sync {
    /// Workloads under test, in discovery order.
    ///
    /// A failed lookup in one namespace is recorded in the listing and the
    /// rest are still collected. `Err` means nothing could be listed at all.
    fn workloads(&self) -> Result<WorkloadListing, NetCheckError>;

    /// Target namespaces.
    fn namespaces(&self) -> Vec<String>;

    /// Services of one namespace.
    fn list_services(&self, namespace: &str) -> Result<Vec<Service>, NetCheckError>;

    /// Short label of where objects come from, shown in reports.
    fn source(&self) -> String {
        "cluster".to_string()
    }
}
