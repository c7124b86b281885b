use std::path::PathBuf;
use std::time::Instant;

use ::time::{format_description::well_known, OffsetDateTime};
use tracing::info;

use crate::error::Result;
use crate::ports;
use crate::prober::{SocketProber, TcpProber, TokioProber};
use crate::strategy::{AsyncConnectScan, ExternalToolScan, PoolScan, ScanStrategy, ThreaderScan};
use crate::types::{ScanMethod, ScanOutcome, ScanRequest, ScanTarget};

/// Settings that outlive a single request.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Binary used by the `nmap` method.
    pub nmap_path: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            nmap_path: PathBuf::from("nmap"),
        }
    }
}

/// Dispatches requests to a strategy and remembers the last target scanned.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScannerConfig,
    last_target: Option<String>,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config,
            last_target: None,
        }
    }

    /// Target of the most recent [`Scanner::scan`] call, successful or not.
    pub fn last_target(&self) -> Option<&str> {
        self.last_target.as_deref()
    }

    pub fn external_tool(&self) -> ExternalToolScan {
        ExternalToolScan::new(self.config.nmap_path.clone())
    }

    pub fn strategy_for(&self, method: ScanMethod) -> Box<dyn ScanStrategy> {
        match method {
            ScanMethod::Default => Box::new(PoolScan::new(TcpProber)),
            ScanMethod::Threader => Box::new(ThreaderScan::new(SocketProber)),
            ScanMethod::Async => Box::new(AsyncConnectScan::new(TokioProber)),
            ScanMethod::Nmap => Box::new(self.external_tool()),
        }
    }

    /// Validate the request, run the selected strategy and wrap the result.
    ///
    /// Input errors (empty target, bad ports, zero timeout or concurrency,
    /// unresolvable host) are returned before any probe is sent.
    pub fn scan(&mut self, request: &ScanRequest) -> Result<ScanOutcome> {
        self.last_target = Some(request.target.trim().to_string());

        let opts = request.options()?;
        let ports = match &request.ports {
            Some(p) => {
                ports::validate_ports(p)?;
                ports::normalize(p.clone())
            }
            None => ports::default_ports(),
        };
        let target = ScanTarget::resolve(&request.target)?;
        let strategy = self.strategy_for(request.method);

        info!(
            target = %target.host,
            addr = %target.addr,
            method = strategy.name(),
            ports = ports.len(),
            concurrency = opts.concurrency,
            timeout_ms = opts.timeout.as_millis() as u64,
            "starting scan"
        );
        let start = Instant::now();
        let open = strategy.scan(&target, &ports, &opts)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(target = %target.host, open = open.len(), elapsed_ms, "scan finished");

        Ok(ScanOutcome {
            target: target.host,
            address: target.addr,
            method: request.method,
            ports: open,
            scanned: ports.len(),
            elapsed_ms,
            finished_at: now_rfc3339(),
        })
    }
}

/// One-shot scan with a default [`Scanner`].
pub fn scan_target(request: &ScanRequest) -> Result<ScanOutcome> {
    Scanner::default().scan(request)
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
