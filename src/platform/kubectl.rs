//! Live cluster access through the `kubectl` binary.
//!
//! Discovery lists pods and services as JSON; remote execution goes through
//! `kubectl exec`. Every invocation is bounded by its own timeout and the
//! child is killed once it expires.

use crate::platform::cluster::{
    Container, ContainerRef, Discovery, NetworkInterface, Service, Workload, WorkloadListing,
    DEFAULT_NETWORK,
};
use crate::platform::exec::{ExecOutput, RemoteExecutor};
use crate::NetCheckError;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::net::IpAddr;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Annotations carrying the multus network status, current key first.
pub const NETWORK_STATUS_ANNOTATIONS: [&str; 2] = [
    "k8s.v1.cni.cncf.io/network-status",
    "k8s.v1.cni.cncf.io/networks-status",
];

/// Label that opts a workload out of connectivity checks.
pub const SKIP_CONNECTIVITY_LABEL: &str = "test-network-function.com/skip_connectivity_tests";

pub const DEFAULT_EXEC_TIMEOUT_MS: u64 = 60_000;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of one kubectl invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// How to invoke kubectl.
#[derive(Debug, Clone)]
pub struct Kubectl {
    pub binary: String,
    /// Kubeconfig context, current context when None
    pub context: Option<String>,
    pub timeout_ms: u64,
}

impl Default for Kubectl {
    fn default() -> Self {
        Kubectl {
            binary: "kubectl".to_string(),
            context: None,
            timeout_ms: DEFAULT_EXEC_TIMEOUT_MS,
        }
    }
}

impl Kubectl {
    fn full_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(ctx) = &self.context {
            full.push("--context");
            full.push(ctx.as_str());
        }
        full.extend_from_slice(args);
        full
    }

    /// Run kubectl with `args`, killing it after `timeout_ms`.
    ///
    /// Only spawn failures and timeouts are errors; a non-zero exit is
    /// returned in the output for the caller to classify.
    pub fn run(&self, args: &[&str]) -> Result<CommandOutput, NetCheckError> {
        let args = self.full_args(args);
        let rendered = format!("{} {}", self.binary, args.join(" "));
        debug!(command = %rendered, "spawning");

        let io_err = |message: String| NetCheckError::Io {
            context: rendered.clone(),
            message,
        };

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| io_err(e.to_string()))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + Duration::from_millis(self.timeout_ms);
        let status = loop {
            match child.try_wait().map_err(|e| io_err(e.to_string()))? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(command = %rendered, timeout_ms = self.timeout_ms, "kubectl timed out");
                    return Err(io_err(format!("timed out after {} ms", self.timeout_ms)));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let collect = |h: Option<thread::JoinHandle<String>>| {
            h.and_then(|h| h.join().ok()).unwrap_or_default()
        };

        Ok(CommandOutput {
            status: status.code(),
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[derive(Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Deserialize)]
struct Pod {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: PodSpec,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

#[derive(Default, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<Container>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default, rename = "podIP")]
    pod_ip: Option<IpAddr>,
    #[serde(default, rename = "podIPs")]
    pod_ips: Vec<PodIp>,
}

#[derive(Deserialize)]
struct PodIp {
    ip: IpAddr,
}

#[derive(Deserialize)]
struct ServiceList {
    #[serde(default)]
    items: Vec<ServiceObject>,
}

#[derive(Deserialize)]
struct ServiceObject {
    metadata: ObjectMeta,
    #[serde(default)]
    spec: ServiceSpec,
}

#[derive(Default, Deserialize)]
struct ServiceSpec {
    #[serde(rename = "type", default)]
    service_type: String,
}

/// Decode a `kubectl get pods -o json` document into workloads.
pub fn workloads_from_pod_list(json: &str) -> Result<Vec<Workload>, NetCheckError> {
    let list: PodList = serde_json::from_str(json).map_err(|e| NetCheckError::Parse {
        context: "pod list".to_string(),
        message: e.to_string(),
    })?;
    Ok(list.items.into_iter().map(workload_from_pod).collect())
}

fn workload_from_pod(pod: Pod) -> Workload {
    let mut ips: Vec<IpAddr> = pod.status.pod_ips.iter().map(|p| p.ip).collect();
    if ips.is_empty() {
        ips.extend(pod.status.pod_ip);
    }

    let mut interfaces = Vec::new();
    if !ips.is_empty() {
        interfaces.push(NetworkInterface {
            name: DEFAULT_NETWORK.to_string(),
            interface: None,
            ips,
            default: true,
        });
    }

    let id = format!("{}/{}", pod.metadata.namespace, pod.metadata.name);
    interfaces.extend(secondary_interfaces(&id, &pod.metadata.annotations));

    let skip_connectivity_tests = pod
        .metadata
        .labels
        .get(SKIP_CONNECTIVITY_LABEL)
        .is_some_and(|v| !v.eq_ignore_ascii_case("false"));

    Workload {
        namespace: pod.metadata.namespace,
        name: pod.metadata.name,
        containers: pod.spec.containers,
        interfaces,
        skip_connectivity_tests,
    }
}

/// Non-default entries of the network-status annotation.
///
/// A malformed annotation is logged and contributes no attachments.
fn secondary_interfaces(
    workload: &str,
    annotations: &BTreeMap<String, String>,
) -> Vec<NetworkInterface> {
    let Some(raw) = NETWORK_STATUS_ANNOTATIONS
        .iter()
        .find_map(|key| annotations.get(*key))
    else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<NetworkInterface>>(raw) {
        Ok(entries) => entries
            .into_iter()
            .filter(|e| !e.default && !e.ips.is_empty())
            .collect(),
        Err(e) => {
            warn!(workload, error = %e, "ignoring malformed network-status annotation");
            Vec::new()
        }
    }
}

/// Decode a `kubectl get services -o json` document.
pub fn services_from_list(json: &str, namespace: &str) -> Result<Vec<Service>, NetCheckError> {
    let list: ServiceList = serde_json::from_str(json).map_err(|e| NetCheckError::Parse {
        context: format!("service list of namespace {}", namespace),
        message: e.to_string(),
    })?;
    Ok(list
        .items
        .into_iter()
        .map(|s| Service {
            namespace: if s.metadata.namespace.is_empty() {
                namespace.to_string()
            } else {
                s.metadata.namespace
            },
            name: s.metadata.name,
            service_type: s.spec.service_type,
        })
        .collect())
}

/// Discovers pods and services in a fixed set of namespaces.
pub struct KubectlDiscovery {
    kubectl: Kubectl,
    namespaces: Vec<String>,
    labels: Vec<String>,
}

impl KubectlDiscovery {
    /// `labels` are selectors (`key=value`); an empty list selects every pod.
    pub fn new(kubectl: Kubectl, namespaces: Vec<String>, labels: Vec<String>) -> Self {
        KubectlDiscovery {
            kubectl,
            namespaces,
            labels,
        }
    }

    fn get(&self, resource: &str, namespace: &str, selector: Option<&str>) -> Result<String, NetCheckError> {
        let mut args = vec!["get", resource, "-n", namespace, "-o", "json"];
        if let Some(sel) = selector {
            args.push("-l");
            args.push(sel);
        }

        let listing_err = |message: String| NetCheckError::Listing {
            resource: resource.to_string(),
            namespace: namespace.to_string(),
            message,
        };

        let output = self.kubectl.run(&args).map_err(|e| listing_err(e.to_string()))?;
        if !output.success() {
            return Err(listing_err(output.stderr.trim().to_string()));
        }
        Ok(output.stdout)
    }
}

impl Discovery for KubectlDiscovery {
    fn workloads(&self) -> Result<WorkloadListing, NetCheckError> {
        let selectors: Vec<Option<&str>> = if self.labels.is_empty() {
            vec![None]
        } else {
            self.labels.iter().map(|l| Some(l.as_str())).collect()
        };

        let mut seen = HashSet::new();
        let mut listing = WorkloadListing::default();
        let mut attempts = 0;
        for namespace in &self.namespaces {
            for selector in &selectors {
                attempts += 1;
                let pods = self
                    .get("pods", namespace, *selector)
                    .and_then(|json| workloads_from_pod_list(&json));
                match pods {
                    Ok(pods) => {
                        for workload in pods {
                            if seen.insert(workload.id()) {
                                listing.workloads.push(workload);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            namespace = %namespace,
                            selector = selector.unwrap_or("<all>"),
                            error = %e,
                            "pod listing failed, continuing"
                        );
                        listing.failures.push(e);
                    }
                }
            }
        }

        if attempts > 0 && listing.failures.len() == attempts {
            return Err(listing.failures.swap_remove(0));
        }

        debug!(
            count = listing.workloads.len(),
            failed = listing.failures.len(),
            "discovered workloads"
        );
        Ok(listing)
    }

    fn namespaces(&self) -> Vec<String> {
        self.namespaces.clone()
    }

    fn list_services(&self, namespace: &str) -> Result<Vec<Service>, NetCheckError> {
        let json = self.get("services", namespace, None)?;
        services_from_list(&json, namespace)
    }

    fn source(&self) -> String {
        match &self.kubectl.context {
            Some(ctx) => format!("kubectl:{}", ctx),
            None => "kubectl".to_string(),
        }
    }
}

/// Runs commands inside containers with `kubectl exec`.
pub struct KubectlExecutor {
    kubectl: Kubectl,
}

impl KubectlExecutor {
    pub fn new(kubectl: Kubectl) -> Self {
        KubectlExecutor { kubectl }
    }
}

impl RemoteExecutor for KubectlExecutor {
    fn exec(&self, command: &str, target: &ContainerRef) -> Result<ExecOutput, NetCheckError> {
        let args = [
            "exec",
            "-n",
            target.namespace.as_str(),
            target.workload.as_str(),
            "-c",
            target.container.as_str(),
            "--",
            "sh",
            "-c",
            command,
        ];

        let remote_err = |message: String| NetCheckError::RemoteExecution {
            command: command.to_string(),
            target: target.to_string(),
            message,
        };

        let output = self.kubectl.run(&args).map_err(|e| remote_err(e.to_string()))?;
        if !output.success() {
            let message = match output.status {
                Some(code) => format!("exit status {}: {}", code, output.stderr.trim()),
                None => format!("terminated by signal: {}", output.stderr.trim()),
            };
            return Err(remote_err(message));
        }

        Ok(ExecOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
