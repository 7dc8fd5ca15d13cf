//! cnf-netcheck CLI entry point
//!
//! Network conformance checks for workloads running in a cluster.

use cnf_netcheck::checks::get_all_checks;
use cnf_netcheck::cli::args::{Args, Command};
use cnf_netcheck::cli::output::get_formatter;
use cnf_netcheck::config::FileConfig;
use cnf_netcheck::platform::cluster::Discovery;
use cnf_netcheck::platform::kubectl::{KubectlDiscovery, KubectlExecutor};
use cnf_netcheck::platform::snapshot::SnapshotDiscovery;
use cnf_netcheck::version::get_build_info;
use cnf_netcheck::{run_checks, CheckCategory, NetCheckConfig, NetCheckError};

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURES: u8 = 1;
const EXIT_RUNTIME_ERROR: u8 = 3;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version arrive here too
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_RUNTIME_ERROR)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(&args.log_level);

    match args.command() {
        Command::Version => {
            println!("{}", get_build_info());
            ExitCode::SUCCESS
        }
        Command::List => {
            print_check_list();
            ExitCode::SUCCESS
        }
        Command::Check => match check(&args) {
            Ok(code) => code,
            Err(e) => {
                error!(error = %e, "run aborted");
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_RUNTIME_ERROR)
            }
        },
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--log-level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_check_list() {
    println!("Available checks:");
    for category in [
        CheckCategory::Connectivity,
        CheckCategory::Ports,
        CheckCategory::Services,
    ] {
        println!();
        println!("{} CHECKS:", category.to_string().to_uppercase());
        for check in get_all_checks().iter().filter(|c| c.category == category) {
            println!("  {:<8} {}", check.id, check.name);
        }
    }
}

fn check(args: &Args) -> Result<ExitCode, NetCheckError> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = NetCheckConfig::from_args(args, file.ping_count);
    let kubectl = file.kubectl(args.kubectl.as_deref(), args.context.as_deref());

    // A snapshot replaces discovery only; commands still run through kubectl.
    let discovery: Box<dyn Discovery> = match &args.snapshot {
        Some(path) => Box::new(SnapshotDiscovery::load(path)?),
        None => {
            let namespaces = pick(&args.namespaces, &file.target_namespaces);
            if namespaces.is_empty() {
                return Err(NetCheckError::Config {
                    origin: "command line".to_string(),
                    message: "no target namespaces: pass --namespace or set target_namespaces"
                        .to_string(),
                });
            }
            let labels = pick(&args.labels, &file.target_pod_labels);
            Box::new(KubectlDiscovery::new(kubectl.clone(), namespaces, labels))
        }
    };
    let executor = KubectlExecutor::new(kubectl);

    debug!(source = %discovery.source(), "starting run");
    let report = run_checks(config, discovery.as_ref(), &executor)?;

    let formatter = get_formatter(args.format, args.no_color, args.verbose, args.quiet);
    println!("{}", formatter.format(&report));

    if report.summary().failed > 0 {
        Ok(ExitCode::from(EXIT_FAILURES))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Command line values when given, file values otherwise.
fn pick(flags: &[String], file: &[String]) -> Vec<String> {
    if flags.is_empty() {
        file.to_vec()
    } else {
        flags.to_vec()
    }
}
