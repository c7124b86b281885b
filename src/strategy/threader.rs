use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::debug;

use super::{finalize, ScanStrategy};
use crate::error::{Result, ScanError};
use crate::prober::{Prober, SocketProber};
use crate::types::{ScanOptions, ScanTarget};

/// Manual worker pool: `min(concurrency, ports)` threads pull ports off a
/// shared queue until it is empty. All workers are joined before returning.
#[derive(Debug, Clone, Default)]
pub struct ThreaderScan<P = SocketProber> {
    prober: P,
}

impl<P: Prober> ThreaderScan<P> {
    pub fn new(prober: P) -> Self {
        Self { prober }
    }
}

impl<P: Prober> ScanStrategy for ThreaderScan<P> {
    fn name(&self) -> &'static str {
        "threader"
    }

    fn scan(&self, target: &ScanTarget, ports: &[u16], opts: &ScanOptions) -> Result<Vec<u16>> {
        let queue: Mutex<VecDeque<u16>> = Mutex::new(ports.iter().copied().collect());
        let failed = AtomicBool::new(false);
        let workers = opts.concurrency.min(ports.len());
        debug!(workers, ports = ports.len(), "threader scan starting");

        let results: Vec<Result<Vec<u16>>> = thread::scope(|s| {
            let mut handles = Vec::with_capacity(workers);
            let mut spawn_error = None;
            for i in 0..workers {
                let spawned = thread::Builder::new()
                    .name(format!("probe-worker-{i}"))
                    .spawn_scoped(s, || self.worker(target, opts, &queue, &failed));
                match spawned {
                    Ok(h) => handles.push(h),
                    Err(e) => {
                        // Stop the already-running workers and report.
                        failed.store(true, Ordering::Relaxed);
                        spawn_error = Some(ScanError::Runtime(format!(
                            "failed to spawn worker thread: {e}"
                        )));
                        break;
                    }
                }
            }
            let mut results: Vec<Result<Vec<u16>>> = handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(ScanError::Runtime("worker thread panicked".into()))
                    })
                })
                .collect();
            if let Some(e) = spawn_error {
                results.push(Err(e));
            }
            results
        });

        let mut open = Vec::new();
        for found in results {
            open.extend(found?);
        }
        Ok(finalize(open))
    }
}

impl<P: Prober> ThreaderScan<P> {
    fn worker(
        &self,
        target: &ScanTarget,
        opts: &ScanOptions,
        queue: &Mutex<VecDeque<u16>>,
        failed: &AtomicBool,
    ) -> Result<Vec<u16>> {
        let mut found = Vec::new();
        while !failed.load(Ordering::Relaxed) {
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(port) = next else { break };
            match self.prober.probe(target.addr, port, opts.timeout) {
                Ok(true) => found.push(port),
                Ok(false) => {}
                Err(e) => {
                    failed.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }
        Ok(found)
    }
}
