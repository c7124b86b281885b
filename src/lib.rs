//! Library crate for portsweep: concurrent TCP connect scanning with
//! pluggable execution strategies.
pub mod advisory;
pub mod error;
pub mod menu;
pub mod ports;
pub mod prober;
pub mod scanner;
pub mod strategy;
pub mod types;

pub use error::{Result, ScanError};
pub use scanner::{scan_target, Scanner, ScannerConfig};
pub use types::{ScanMethod, ScanOptions, ScanOutcome, ScanRequest, ScanTarget};
