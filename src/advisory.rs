//! Service names and recon tips for well-known ports, plus helpers that turn
//! scan results into display text.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

const UNKNOWN_SERVICE: &str = "Unknown";
const NO_TIPS: &str = "No tips available.";

/// `(port, service, tip)`
const SERVICE_TIPS: &[(u16, &str, &str)] = &[
    (21, "FTP", "Try anonymous login or inspect the banner for version info."),
    (22, "SSH", "Check for default credentials or weak key auth if permitted."),
    (80, "HTTP", "Browse the web interface or use curl to inspect pages."),
    (443, "HTTPS", "Similar to HTTP but over TLS; inspect certificates."),
    (3306, "MySQL", "Look for default credentials or test basic queries."),
];

fn lookup(port: u16) -> Option<(&'static str, &'static str)> {
    SERVICE_TIPS
        .iter()
        .find(|(p, _, _)| *p == port)
        .map(|&(_, name, tip)| (name, tip))
}

/// Service name for a port, `"Unknown"` when not in the table.
pub fn service_name(port: u16) -> &'static str {
    lookup(port).map_or(UNKNOWN_SERVICE, |(name, _)| name)
}

/// `(port, service)` for each port.
pub fn describe(ports: &[u16]) -> Vec<(u16, &'static str)> {
    ports.iter().map(|&p| (p, service_name(p))).collect()
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconTip {
    pub port: u16,
    pub service: &'static str,
    pub tip: &'static str,
}

impl fmt::Display for ReconTip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "- {} ({}): {}", self.port, self.service, self.tip)
    }
}

pub fn recon_tips(ports: &[u16]) -> Vec<ReconTip> {
    ports
        .iter()
        .map(|&port| {
            let (service, tip) = lookup(port).unwrap_or((UNKNOWN_SERVICE, NO_TIPS));
            ReconTip { port, service, tip }
        })
        .collect()
}

pub fn format_services(ports: &[u16]) -> String {
    let mut out = String::from("Open Ports Detected:");
    for (port, name) in describe(ports) {
        out.push_str(&format!("\n- {port}: {name}"));
    }
    out
}

pub fn format_recon_tips(ports: &[u16]) -> String {
    let mut out = String::from("Recon Tips:");
    for tip in recon_tips(ports) {
        out.push('\n');
        out.push_str(&tip.to_string());
    }
    out
}

fn summary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Anchor on the last colon of the line so IPv6 targets keep their port list.
    RE.get_or_init(|| {
        Regex::new(r"(?m)ports? on .*:[ \t]*([0-9 ,]+)[ \t\r]*$").expect("summary regex is valid")
    })
}

/// Recover the port list from a CLI summary line such as
/// `"Open ports on host: 22, 80"`. Out-of-range numbers are skipped.
pub fn parse_summary_ports(output: &str) -> Vec<u16> {
    let Some(caps) = summary_regex().captures(output) else {
        return Vec::new();
    };
    caps[1]
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|n| n.parse::<u16>().ok())
        .filter(|&p| p != 0)
        .collect()
}

/// Follow-up guidance for a scan command's printed output.
pub fn scan_guidance(output: &str) -> Option<String> {
    let ports = parse_summary_ports(output);
    if !ports.is_empty() {
        let list: Vec<String> = ports.iter().map(u16::to_string).collect();
        return Some(format!(
            "Open ports found: {}\n{}",
            list.join(", "),
            format_recon_tips(&ports)
        ));
    }
    if output.contains("No open ports") {
        return Some("Scan finished. No open ports detected.".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_defaults_to_unknown() {
        assert_eq!(describe(&[21, 8080]), vec![(21, "FTP"), (8080, "Unknown")]);
    }

    #[test]
    fn tip_line_format() {
        let tips = recon_tips(&[443]);
        assert_eq!(
            tips[0].to_string(),
            "- 443 (HTTPS): Similar to HTTP but over TLS; inspect certificates."
        );
    }

    #[test]
    fn services_block() {
        assert_eq!(
            format_services(&[22, 9999]),
            "Open Ports Detected:\n- 22: SSH\n- 9999: Unknown"
        );
    }

    #[test]
    fn summary_parsing_skips_out_of_range() {
        assert_eq!(
            parse_summary_ports("Open ports on 10.0.0.1: 22, 80, 70000"),
            vec![22, 80]
        );
        assert!(parse_summary_ports("nothing here").is_empty());
    }

    #[test]
    fn summary_parsing_with_ipv6_target() {
        assert_eq!(parse_summary_ports("Open ports on ::1: 22, 80"), vec![22, 80]);
        assert_eq!(
            parse_summary_ports("scan log\nOpen ports on fe80::1%eth0: 443\ndone"),
            vec![443]
        );
    }
}
