use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use tracing::debug;

use super::{finalize, ScanStrategy};
use crate::error::{Result, ScanError};
use crate::prober::{Prober, TcpProber};
use crate::types::{ScanOptions, ScanTarget};

/// Bounded thread pool scan: one task per port submitted to a rayon pool of
/// `concurrency` threads. Results are gathered in completion order and
/// sorted afterwards.
#[derive(Debug, Clone, Default)]
pub struct PoolScan<P = TcpProber> {
    prober: P,
}

impl<P: Prober> PoolScan<P> {
    pub fn new(prober: P) -> Self {
        Self { prober }
    }
}

impl<P: Prober> ScanStrategy for PoolScan<P> {
    fn name(&self) -> &'static str {
        "default"
    }

    fn scan(&self, target: &ScanTarget, ports: &[u16], opts: &ScanOptions) -> Result<Vec<u16>> {
        let workers = opts.concurrency.min(ports.len()).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("probe-pool-{i}"))
            .build()
            .map_err(|e| ScanError::Runtime(format!("failed to build thread pool: {e}")))?;
        debug!(workers, ports = ports.len(), "pool scan starting");

        let addr = target.addr;
        let timeout = opts.timeout;
        let failed = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel::<Result<Option<u16>>>();

        pool.scope(|s| {
            for &port in ports {
                let tx = tx.clone();
                let prober = &self.prober;
                let failed = &failed;
                s.spawn(move |_| {
                    // A fatal error elsewhere makes the rest of the queue moot.
                    if failed.load(Ordering::Relaxed) {
                        return;
                    }
                    let res = prober.probe(addr, port, timeout).map(|open| open.then_some(port));
                    if res.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    let _ = tx.send(res);
                });
            }
        });
        drop(tx);

        let mut open = Vec::new();
        for res in rx {
            if let Some(port) = res? {
                open.push(port);
            }
        }
        Ok(finalize(open))
    }
}
