use std::collections::HashSet;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, ScanError};

/// Ports scanned when the caller does not name any.
pub const DEFAULT_RANGE: RangeInclusive<u16> = 1..=1024;

/// Parse a port specification into a deduplicated list of TCP ports (1..=65535).
///
/// Items are separated by commas, whitespace or newlines:
/// - single port number: `80`
/// - inclusive range: `8000-8010` (spaces around the dash are allowed)
/// - comments: everything after `#` on a line is ignored
///
/// First appearance order is preserved.
pub fn parse_port_spec(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");
        let line = range_dash().replace_all(line, "-");

        for item in line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|item| !item.is_empty())
        {
            if let Some((a, b)) = item.split_once('-') {
                let start = parse_port(a)
                    .map_err(|e| invalid(line_no, &format!("invalid start in range {item}: {e}")))?;
                let end = parse_port(b)
                    .map_err(|e| invalid(line_no, &format!("invalid end in range {item}: {e}")))?;
                if start > end {
                    return Err(invalid(
                        line_no,
                        &format!("invalid range {start}-{end} (start > end)"),
                    ));
                }
                for p in start..=end {
                    if seen.insert(p) {
                        out.push(p);
                    }
                }
                continue;
            }

            let p = parse_port(item).map_err(|e| invalid(line_no, &e))?;
            if seen.insert(p) {
                out.push(p);
            }
        }
    }

    Ok(out)
}

/// Load a port specification from a file path.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        ScanError::InvalidInput(format!("failed to read ports file {}: {e}", path.display()))
    })?;
    parse_port_spec(&content)
}

/// The default scan range, `1..=1024`.
pub fn default_ports() -> Vec<u16> {
    DEFAULT_RANGE.collect()
}

/// Reject port 0 before any probe is attempted.
pub fn validate_ports(ports: &[u16]) -> Result<()> {
    if ports.is_empty() {
        return Err(ScanError::InvalidInput("port list must not be empty".into()));
    }
    if ports.contains(&0) {
        return Err(ScanError::InvalidInput("port 0 is not scannable".into()));
    }
    Ok(())
}

/// Sort ascending and drop duplicates.
pub fn normalize(mut ports: Vec<u16>) -> Vec<u16> {
    ports.sort_unstable();
    ports.dedup();
    ports
}

/// Render ports as an nmap-style `-p` argument, collapsing consecutive runs.
///
/// `1..=1024` renders as `1-1024`; `[22, 80, 81, 82]` as `22,80-82`.
pub fn render_port_spec(ports: &[u16]) -> String {
    let ports = normalize(ports.to_vec());
    let mut parts: Vec<String> = Vec::new();
    let mut iter = ports.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(&next) = iter.peek() {
            if Some(next) != end.checked_add(1) {
                break;
            }
            end = next;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{start}-{end}"));
        }
    }
    parts.join(",")
}

fn parse_port(s: &str) -> std::result::Result<u16, String> {
    let s = s.trim();
    let val: u32 = s.parse::<u32>().map_err(|e| format!("{s:?}: {e}"))?;
    if val == 0 || val > 65535 {
        return Err(format!("port out of range: {val}"));
    }
    Ok(val as u16)
}

/// Whitespace around a range dash, so `8000 - 8002` reads as one item.
fn range_dash() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*-\s*").expect("range dash regex is valid"))
}

fn invalid(line_no: usize, msg: &str) -> ScanError {
    ScanError::InvalidInput(format!("line {line_no}: {msg}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_comma_list() {
        let ports = parse_port_spec("80,22, 443").unwrap();
        assert_eq!(ports, vec![80, 22, 443]);
    }

    #[test]
    fn parse_ranges_and_dedup() {
        let ports = parse_port_spec("8000-8002,80\n8001\n").unwrap();
        assert_eq!(ports, vec![8000, 8001, 8002, 80]);
    }

    #[test]
    fn parse_with_comments_and_whitespace() {
        let input = r#"
            # common web ports
            80  # http
            443 # https
            8000-8002   # dev servers

            # blank lines and spaces should be fine
        "#;
        let ports = parse_port_spec(input).unwrap();
        assert_eq!(ports, vec![80, 443, 8000, 8001, 8002]);
    }

    #[test]
    fn spaced_range_dash() {
        let ports = parse_port_spec("8000 - 8002\n22 -23, 80").unwrap();
        assert_eq!(ports, vec![8000, 8001, 8002, 22, 23, 80]);
    }

    #[test]
    fn invalid_values_error() {
        assert!(parse_port_spec("70000").is_err());
        assert!(parse_port_spec("0").is_err());
        assert!(parse_port_spec("90-80").is_err());
        assert!(parse_port_spec("http").is_err());
    }

    #[test]
    fn default_range_is_first_1024() {
        let d = default_ports();
        assert_eq!(d.len(), 1024);
        assert_eq!(d.first(), Some(&1));
        assert_eq!(d.last(), Some(&1024));
    }

    #[test]
    fn render_collapses_runs() {
        assert_eq!(render_port_spec(&default_ports()), "1-1024");
        assert_eq!(render_port_spec(&[443, 22, 80, 81, 82]), "22,80-82,443");
        assert_eq!(render_port_spec(&[65535, 65534]), "65534-65535");
    }

    #[test]
    fn validate_rejects_empty_and_zero() {
        assert!(validate_ports(&[]).is_err());
        assert!(validate_ports(&[0, 80]).is_err());
        assert!(validate_ports(&[80]).is_ok());
    }
}
