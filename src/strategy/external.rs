//! Delegated scan through an external nmap binary.
//!
//! The tool manages its own timing and parallelism, so the shared timeout and
//! concurrency options are ignored. Executes: `<tool> -p <port_spec> <target>`
//! and reads stdout only.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use tracing::{debug, warn};

use super::{finalize, ScanStrategy};
use crate::error::{Result, ScanError};
use crate::ports::render_port_spec;
use crate::types::{ScanOptions, ScanTarget};

#[derive(Debug, Clone)]
pub struct ExternalToolScan {
    program: PathBuf,
}

impl Default for ExternalToolScan {
    fn default() -> Self {
        Self::new("nmap")
    }
}

impl ExternalToolScan {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn tool_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Whether the binary can be executed at all.
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    /// Run the tool and parse its report. Unlike [`ScanStrategy::scan`], a
    /// missing binary surfaces as [`ScanError::ToolUnavailable`].
    pub fn run(&self, host: &str, ports: &[u16]) -> Result<Vec<u16>> {
        let spec = render_port_spec(ports);
        debug!(tool = %self.tool_name(), %spec, host, "invoking external scanner");
        let output = self.exec(&["-p", spec.as_str(), host])?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(finalize(parse_report(&stdout)))
    }

    /// Service/version detection on already-known open ports. Returns the
    /// tool's raw report for display.
    pub fn drill_down(&self, host: &str, ports: &[u16]) -> Result<String> {
        let spec = render_port_spec(ports);
        let output = self.exec(&["-sV", "-p", spec.as_str(), host])?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn exec(&self, args: &[&str]) -> Result<Output> {
        Command::new(&self.program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => ScanError::ToolUnavailable {
                    tool: self.tool_name(),
                },
                _ => ScanError::Tool(format!("failed to run {}: {e}", self.tool_name())),
            })
    }
}

impl ScanStrategy for ExternalToolScan {
    fn name(&self) -> &'static str {
        "nmap"
    }

    fn scan(&self, target: &ScanTarget, ports: &[u16], _opts: &ScanOptions) -> Result<Vec<u16>> {
        match self.run(&target.host, ports) {
            Err(ScanError::ToolUnavailable { tool }) => {
                warn!(%tool, "external scanner unavailable, returning no ports");
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

/// Extract open ports from an nmap text report.
///
/// A line counts when it has a `<port>/tcp` token and a standalone `open`
/// token; `open|filtered` is not confirmed open.
pub fn parse_report(report: &str) -> Vec<u16> {
    report
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if !tokens.contains(&"open") {
                return None;
            }
            tokens
                .iter()
                .find_map(|t| t.split_once('/').filter(|(_, proto)| *proto == "tcp"))
                .and_then(|(port, _)| port.parse::<u16>().ok())
                .filter(|&p| p != 0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    const REPORT: &str = "\
Starting Nmap 7.94 ( https://nmap.org ) at 2026-01-01 00:00 UTC
Nmap scan report for localhost (127.0.0.1)
Host is up (0.00010s latency).
Not shown: 1020 closed tcp ports (conn-refused)
PORT     STATE         SERVICE
443/tcp  open          https
22/tcp   open          ssh
25/tcp   filtered      smtp
53/tcp   open|filtered domain
3306/tcp closed        mysql

Nmap done: 1 IP address (1 host up) scanned in 0.05 seconds
";

    #[test]
    fn parses_only_open_tcp_lines() {
        assert_eq!(parse_report(REPORT), vec![443, 22]);
    }

    #[test]
    fn ignores_noise() {
        assert!(parse_report("").is_empty());
        assert!(parse_report("open sesame\nfoo/tcp open x").is_empty());
        assert_eq!(parse_report("80/udp open http\n80/tcp open http"), vec![80]);
    }

    #[test]
    fn missing_binary_fails_soft() {
        let scan = ExternalToolScan::new("/nonexistent/definitely-not-nmap");
        assert!(!scan.is_available());
        let target = ScanTarget {
            host: "127.0.0.1".into(),
            addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        };
        let open = scan
            .scan(&target, &[22, 80], &ScanOptions::default())
            .unwrap();
        assert!(open.is_empty());
        assert!(matches!(
            scan.run("127.0.0.1", &[22]),
            Err(ScanError::ToolUnavailable { .. })
        ));
    }
}
