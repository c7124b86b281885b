//! Error types for the portsweep library.

use thiserror::Error;

/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Errors that abort a whole scan call.
///
/// Per-port connect failures (refused, timed out, unreachable) are not errors;
/// they are folded into "not open" by the prober.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Malformed request detected before any network I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Target name could not be resolved to an address.
    #[error("failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    /// Method selector did not name a known strategy.
    #[error("unknown scan method: {0} (expected default, threader, async or nmap)")]
    UnknownMethod(String),

    /// Transport failure outside the expected closed/filtered set.
    #[error("probe of port {port} failed: {source}")]
    Probe {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// External scanning tool is not installed or not executable.
    #[error("{tool} is not installed or not on PATH")]
    ToolUnavailable { tool: String },

    /// External scanning tool could not be run for another reason.
    #[error("external tool failed: {0}")]
    Tool(String),

    /// Worker pool or async runtime could not be built, or a worker died.
    #[error("scan runtime error: {0}")]
    Runtime(String),
}
