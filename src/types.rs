use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Default per-port connect timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Which strategy executes the probes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMethod {
    /// Bounded thread pool.
    #[default]
    Default,
    /// Explicit worker threads draining a shared queue.
    Threader,
    /// Cooperative tasks on a single-threaded runtime.
    Async,
    /// Delegate to an external nmap binary.
    Nmap,
}

impl ScanMethod {
    pub const ALL: [ScanMethod; 4] = [
        ScanMethod::Default,
        ScanMethod::Threader,
        ScanMethod::Async,
        ScanMethod::Nmap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScanMethod::Default => "default",
            ScanMethod::Threader => "threader",
            ScanMethod::Async => "async",
            ScanMethod::Nmap => "nmap",
        }
    }

    /// Concurrency used when the caller does not pick one.
    pub fn default_concurrency(self) -> usize {
        match self {
            ScanMethod::Threader => 500,
            _ => 100,
        }
    }
}

impl fmt::Display for ScanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMethod {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        ScanMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ScanError::UnknownMethod(s.to_string()))
    }
}

/// Per-probe knobs shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency: ScanMethod::Default.default_concurrency(),
        }
    }
}

/// A caller's scan request. Unset fields fall back to the method defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: String,
    pub ports: Option<Vec<u16>>,
    pub timeout: Duration,
    pub concurrency: Option<usize>,
    pub method: ScanMethod,
}

impl ScanRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ports: None,
            timeout: DEFAULT_TIMEOUT,
            concurrency: None,
            method: ScanMethod::Default,
        }
    }

    pub fn ports(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.ports = Some(ports.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn method(mut self, method: ScanMethod) -> Self {
        self.method = method;
        self
    }

    /// Resolve the effective options, rejecting zero values.
    pub fn options(&self) -> Result<ScanOptions> {
        if self.timeout.is_zero() {
            return Err(ScanError::InvalidInput("timeout must be positive".into()));
        }
        let concurrency = self
            .concurrency
            .unwrap_or_else(|| self.method.default_concurrency());
        if concurrency == 0 {
            return Err(ScanError::InvalidInput("concurrency must be positive".into()));
        }
        Ok(ScanOptions {
            timeout: self.timeout,
            concurrency,
        })
    }
}

/// A validated target: the name as given plus the address probes connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub host: String,
    pub addr: IpAddr,
}

impl ScanTarget {
    /// Resolve `host` once, preferring IPv4 when the resolver returns both families.
    pub fn resolve(host: &str) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ScanError::InvalidInput("target must not be empty".into()));
        }
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(Self {
                host: host.to_string(),
                addr,
            });
        }
        let addrs: Vec<SocketAddr> = (host, 0)
            .to_socket_addrs()
            .map_err(|e| ScanError::Resolve {
                host: host.to_string(),
                reason: e.to_string(),
            })?
            .collect();
        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .map(SocketAddr::ip)
            .ok_or_else(|| ScanError::Resolve {
                host: host.to_string(),
                reason: "no addresses returned".into(),
            })?;
        Ok(Self {
            host: host.to_string(),
            addr,
        })
    }
}

/// Result of one dispatcher call. Carries the target so follow-up actions
/// do not need any shared state.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub target: String,
    pub address: IpAddr,
    pub method: ScanMethod,
    /// Open ports, strictly ascending.
    pub ports: Vec<u16>,
    /// Number of distinct ports probed.
    pub scanned: usize,
    pub elapsed_ms: u64,
    pub finished_at: String,
}

impl ScanOutcome {
    /// One-line human summary used by the CLI.
    pub fn summary(&self) -> String {
        if self.ports.is_empty() {
            format!("No open ports found on {}", self.target)
        } else {
            let list: Vec<String> = self.ports.iter().map(u16::to_string).collect();
            format!("Open ports on {}: {}", self.target, list.join(", "))
        }
    }
}
