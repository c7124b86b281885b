use std::io::{BufRead, Write};

use anyhow::Result;

use crate::advisory::{format_recon_tips, format_services};
use crate::error::ScanError;
use crate::types::ScanOutcome;

/// Interactive post-scan menu. `drill_down` receives the scanned target and
/// its open ports and returns the external tool's report.
///
/// Returns when the user exits or input reaches EOF.
pub fn run_menu<R, W, F>(
    mut input: R,
    mut out: W,
    outcome: &ScanOutcome,
    mut drill_down: F,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(&str, &[u16]) -> Result<String, ScanError>,
{
    if outcome.ports.is_empty() {
        writeln!(out, "No open ports to analyze.")?;
        return Ok(());
    }

    let mut line = String::new();
    loop {
        writeln!(out, "\nWhat would you like to do?")?;
        writeln!(out, "[1] Print common service behavior")?;
        writeln!(out, "[2] Print recon tips for each service")?;
        writeln!(out, "[3] Drill down on {} with nmap", outcome.target)?;
        writeln!(out, "[4] Exit")?;
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "1" => writeln!(out, "\n{}", format_services(&outcome.ports))?,
            "2" => writeln!(out, "\n{}", format_recon_tips(&outcome.ports))?,
            "3" => match drill_down(&outcome.target, &outcome.ports) {
                Ok(report) => writeln!(out, "\n{}", report.trim_end())?,
                Err(e) => writeln!(out, "\n{e}")?,
            },
            "4" => break,
            _ => writeln!(out, "Invalid choice. Please select 1, 2, 3, or 4.")?,
        }
    }
    Ok(())
}
