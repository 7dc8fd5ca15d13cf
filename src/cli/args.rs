//! Command line arguments.
//!
//! Flags are global so `cnf-netcheck -n prod` and `cnf-netcheck check -n prod`
//! behave the same; the subcommand defaults to `check`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Subcommand)]
pub enum Command {
    /// Run the network checks (default)
    #[default]
    Check,
    /// List all available checks
    List,
    /// Print version information
    Version,
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
    /// JUnit XML for CI/CD integration
    Junit,
}

/// Check category filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CategoryFilter {
    #[default]
    All,
    /// ICMP reachability (NET-001..NET-004)
    Connectivity,
    /// Undeclared listening ports (NET-005)
    Ports,
    /// NodePort services (NET-006)
    Services,
}

/// Network conformance checks for cluster workloads
#[derive(Debug, Clone, Parser)]
#[command(name = "cnf-netcheck", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub subcommand: Option<Command>,

    /// Run only checks in this category
    #[arg(long, value_enum, default_value_t = CategoryFilter::All, global = true)]
    pub category: CategoryFilter,

    /// Skip checks by ID (comma separated)
    #[arg(long, value_delimiter = ',', global = true)]
    pub skip: Vec<String>,

    /// Run only these checks by ID (comma separated)
    #[arg(long, value_delimiter = ',', global = true)]
    pub only: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "CNF_NETCHECK_FORMAT", global = true)]
    pub format: OutputFormat,

    /// Only print failures
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print the claims log under each check
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    pub no_color: bool,

    /// Overall run time limit in milliseconds (0 disables it)
    #[arg(long = "timeout", default_value_t = 600_000, global = true)]
    pub timeout_ms: u64,

    /// Probe independent networks concurrently
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Networks probed at once with --parallel
    #[arg(long, default_value_t = 4, global = true)]
    pub max_parallel: usize,

    /// Stop after the first failing check
    #[arg(long, global = true)]
    pub fail_fast: bool,

    /// Echo requests per destination
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), global = true)]
    pub ping_count: Option<u32>,

    /// TOML configuration file
    #[arg(long, env = "CNF_NETCHECK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Read cluster state from a JSON snapshot instead of kubectl
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Target namespace (repeatable)
    #[arg(short = 'n', long = "namespace", global = true)]
    pub namespaces: Vec<String>,

    /// Pod label selector (repeatable)
    #[arg(short = 'l', long = "label", global = true)]
    pub labels: Vec<String>,

    /// kubectl binary
    #[arg(long, global = true)]
    pub kubectl: Option<String>,

    /// kubeconfig context
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,
}

impl Args {
    /// Selected command, `check` when none was given.
    pub fn command(&self) -> Command {
        self.subcommand.unwrap_or_default()
    }
}
