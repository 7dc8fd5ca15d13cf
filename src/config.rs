//! Configuration file.
//!
//! Optional TOML file naming what to test and how to reach the cluster.
//! Command line flags override every value set here.
//!
//! ```toml
//! target_namespaces = ["prod", "edge"]
//! target_pod_labels = ["app=web"]
//! ping_count = 3
//!
//! [kubectl]
//! binary = "/usr/local/bin/kubectl"
//! context = "lab"
//! exec_timeout_ms = 30000
//! ```

use crate::platform::kubectl::{Kubectl, DEFAULT_EXEC_TIMEOUT_MS};
use crate::NetCheckError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Namespaces whose workloads and services are checked
    #[serde(default)]
    pub target_namespaces: Vec<String>,

    /// Pod label selectors (`key=value`); empty selects every pod
    #[serde(default)]
    pub target_pod_labels: Vec<String>,

    /// Echo requests per destination
    #[serde(default)]
    pub ping_count: Option<u32>,

    #[serde(default)]
    pub kubectl: KubectlConfig,
}

/// `[kubectl]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubectlConfig {
    #[serde(default)]
    pub binary: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    /// Per-invocation timeout for kubectl calls
    #[serde(default)]
    pub exec_timeout_ms: Option<u64>,
}

impl FileConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, NetCheckError> {
        let content = std::fs::read_to_string(path).map_err(|e| NetCheckError::Io {
            context: format!("reading config {}", path.display()),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, NetCheckError> {
        let config: FileConfig = toml::from_str(content).map_err(|e| NetCheckError::Config {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;

        if config.ping_count == Some(0) {
            return Err(NetCheckError::Config {
                origin: origin.to_string(),
                message: "ping_count must be at least 1".to_string(),
            });
        }
        Ok(config)
    }

    /// kubectl invocation, with `binary` and `context` taking precedence
    /// over the file values.
    pub fn kubectl(&self, binary: Option<&str>, context: Option<&str>) -> Kubectl {
        let defaults = Kubectl::default();
        Kubectl {
            binary: binary
                .map(str::to_string)
                .or_else(|| self.kubectl.binary.clone())
                .unwrap_or(defaults.binary),
            context: context
                .map(str::to_string)
                .or_else(|| self.kubectl.context.clone()),
            timeout_ms: self.kubectl.exec_timeout_ms.unwrap_or(DEFAULT_EXEC_TIMEOUT_MS),
        }
    }
}
