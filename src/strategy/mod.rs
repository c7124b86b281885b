//! Interchangeable scan strategies.
//!
//! Every strategy takes a resolved target, a non-empty port list and the
//! shared options, and returns the open ports strictly ascending.

pub mod async_io;
pub mod external;
pub mod pool;
pub mod threader;

pub use async_io::AsyncConnectScan;
pub use external::ExternalToolScan;
pub use pool::PoolScan;
pub use threader::ThreaderScan;

use crate::error::Result;
use crate::ports;
use crate::types::{ScanOptions, ScanTarget};

pub trait ScanStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn scan(&self, target: &ScanTarget, ports: &[u16], opts: &ScanOptions) -> Result<Vec<u16>>;
}

/// Completion order must never leak into the result.
pub(crate) fn finalize(open: Vec<u16>) -> Vec<u16> {
    ports::normalize(open)
}
