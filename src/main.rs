use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use portsweep::types::ScanOutcome;
use portsweep::{advisory, menu, ports, ScanMethod, ScanRequest, Scanner, ScannerConfig};

/// portsweep — concurrent TCP connect port scanner with pluggable strategies.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portsweep",
    version,
    about = "Concurrent TCP connect port scanner with pluggable strategies.",
    long_about = None
)]
struct Cli {
    /// Hostname or IP address to scan.
    target: String,

    /// Ports to scan, e.g. `22,80,8000-8010`. Defaults to 1-1024.
    #[arg(long, conflicts_with = "ports_file")]
    ports: Option<String>,

    /// Path to a ports file (ports or ranges, `#` comments allowed).
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Scan strategy.
    #[arg(long, value_enum, default_value_t = Method::Default)]
    method: Method,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 500)]
    timeout_ms: u64,

    /// Max concurrent connect attempts (100 for default/async, 500 for threader).
    #[arg(long)]
    concurrency: Option<usize>,

    /// nmap binary used by `--method nmap` and the follow-up menu.
    #[arg(long = "nmap-path", default_value = "nmap")]
    nmap_path: PathBuf,

    /// Write the outcome as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print recon tips for the open ports.
    #[arg(long, default_value_t = false)]
    tips: bool,

    /// Open the interactive follow-up menu after the scan.
    #[arg(long, default_value_t = false)]
    menu: bool,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    Default,
    Threader,
    Async,
    Nmap,
}

impl From<Method> for ScanMethod {
    fn from(m: Method) -> Self {
        match m {
            Method::Default => ScanMethod::Default,
            Method::Threader => ScanMethod::Threader,
            Method::Async => ScanMethod::Async,
            Method::Nmap => ScanMethod::Nmap,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let port_list = match (&cli.ports, &cli.ports_file) {
        (Some(spec), _) => Some(ports::parse_port_spec(spec).context("invalid --ports")?),
        (None, Some(path)) => Some(ports::load_ports_from_path(path)?),
        (None, None) => None,
    };

    let mut request = ScanRequest::new(cli.target.clone())
        .timeout(Duration::from_millis(cli.timeout_ms))
        .method(cli.method.into());
    if let Some(p) = port_list {
        request = request.ports(p);
    }
    if let Some(c) = cli.concurrency {
        request = request.concurrency(c);
    }

    let mut scanner = Scanner::new(ScannerConfig {
        nmap_path: cli.nmap_path.clone(),
    });
    let outcome = scanner
        .scan(&request)
        .with_context(|| format!("scan of {} failed", cli.target))?;

    if outcome.method == ScanMethod::Nmap
        && outcome.ports.is_empty()
        && !scanner.external_tool().is_available()
    {
        eprintln!("{} is not installed or not on PATH", cli.nmap_path.display());
    }

    println!("{}", outcome.summary());
    if !outcome.ports.is_empty() {
        print_results_table(&outcome);
    }
    if cli.tips && !outcome.ports.is_empty() {
        println!("\n{}", advisory::format_recon_tips(&outcome.ports));
    }

    if let Some(path) = cli.output.as_deref() {
        if let Err(e) = write_outcome_json(path, &outcome) {
            eprintln!("Failed to write JSON to {}: {}", path.display(), e);
        } else {
            println!("Wrote JSON results to {}", path.display());
        }
    }

    if cli.menu {
        let tool = scanner.external_tool();
        menu::run_menu(io::stdin().lock(), io::stdout().lock(), &outcome, |host, open| {
            tool.drill_down(host, open)
        })?;
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_results_table(outcome: &ScanOutcome) {
    let port_w = 5usize;
    let mut svc_w = "service".len();
    for &p in &outcome.ports {
        svc_w = svc_w.max(advisory::service_name(p).len());
    }

    println!(
        "\nOpen ports: {} (scanned: {}, {} ms, method: {})",
        outcome.ports.len(),
        outcome.scanned,
        outcome.elapsed_ms,
        outcome.method
    );
    println!("{:>port_w$}  {:<svc_w$}", "port", "service");
    println!("{:-<port_w$}  {:-<svc_w$}", "", "");
    for &p in &outcome.ports {
        println!("{:>port_w$}  {:<svc_w$}", p, advisory::service_name(p));
    }
}

fn write_outcome_json(path: &Path, outcome: &ScanOutcome) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, outcome)?;
    Ok(())
}
