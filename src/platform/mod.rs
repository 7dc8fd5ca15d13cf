//! Platform abstraction layer.
//!
//! Provides the collaborator interfaces the checks depend on, plus adapters:
//! - Cluster discovery (workloads, namespaces, services)
//! - Remote execution inside a container's network namespace
//! - `kubectl`-backed discovery and execution
//! - JSON snapshot discovery for offline runs

pub mod cluster;
pub mod exec;
pub mod kubectl;
pub mod snapshot;
