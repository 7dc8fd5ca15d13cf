//! Discovery from a JSON cluster snapshot.
//!
//! Lets the checks run against a recorded cluster state:
//!
//! ```json
//! {
//!   "namespaces": ["prod"],
//!   "workloads": [
//!     {
//!       "namespace": "prod",
//!       "name": "web-0",
//!       "containers": [{ "name": "app", "ports": [{ "containerPort": 8080 }] }],
//!       "interfaces": [{ "name": "default", "ips": ["10.0.0.4"], "default": true }]
//!     }
//!   ],
//!   "services": { "prod": [{ "name": "web", "type": "ClusterIP" }] }
//! }
//! ```
//!
//! A namespace listed in `namespaces` without an entry in `services` behaves
//! like a namespace whose service listing failed.

use crate::platform::cluster::{Discovery, Service, Workload, WorkloadListing};
use crate::NetCheckError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterSnapshot {
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub workloads: Vec<Workload>,
    #[serde(default)]
    pub services: BTreeMap<String, Vec<Service>>,
}

pub struct SnapshotDiscovery {
    origin: String,
    snapshot: ClusterSnapshot,
}

impl SnapshotDiscovery {
    pub fn new(origin: impl Into<String>, snapshot: ClusterSnapshot) -> Self {
        SnapshotDiscovery {
            origin: origin.into(),
            snapshot,
        }
    }

    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self, NetCheckError> {
        let content = fs::read_to_string(path).map_err(|e| NetCheckError::Io {
            context: format!("reading snapshot {}", path.display()),
            message: e.to_string(),
        })?;
        Self::from_json_str(&content, &path.display().to_string())
    }

    pub fn from_json_str(json: &str, origin: &str) -> Result<Self, NetCheckError> {
        let snapshot: ClusterSnapshot =
            serde_json::from_str(json).map_err(|e| NetCheckError::Parse {
                context: format!("snapshot {}", origin),
                message: e.to_string(),
            })?;
        Ok(Self::new(origin, snapshot))
    }
}

impl Discovery for SnapshotDiscovery {
    fn workloads(&self) -> Result<WorkloadListing, NetCheckError> {
        Ok(WorkloadListing::complete(self.snapshot.workloads.clone()))
    }

    fn namespaces(&self) -> Vec<String> {
        self.snapshot.namespaces.clone()
    }

    fn list_services(&self, namespace: &str) -> Result<Vec<Service>, NetCheckError> {
        let services = self
            .snapshot
            .services
            .get(namespace)
            .ok_or_else(|| NetCheckError::Listing {
                resource: "services".to_string(),
                namespace: namespace.to_string(),
                message: "namespace not present in snapshot".to_string(),
            })?;

        Ok(services
            .iter()
            .cloned()
            .map(|mut s| {
                if s.namespace.is_empty() {
                    s.namespace = namespace.to_string();
                }
                s
            })
            .collect())
    }

    fn source(&self) -> String {
        format!("snapshot:{}", self.origin)
    }
}
