use std::net::IpAddr;
use std::sync::Arc;
use std::thread;

use tokio::runtime::{Builder, Handle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use super::{finalize, ScanStrategy};
use crate::error::{Result, ScanError};
use crate::prober::{AsyncProber, TokioProber};
use crate::types::{ScanOptions, ScanTarget};

/// Upper bound on simultaneously open sockets for the async scan.
const MAX_IN_FLIGHT: usize = 5_000;

/// Cooperative scan: one task per port, each with its own connect timeout.
///
/// Async callers should await [`AsyncConnectScan::scan_async`] on their own
/// runtime. The blocking [`ScanStrategy::scan`] entry point builds a private
/// current-thread runtime, on a dedicated thread when it is called from
/// inside an existing runtime.
#[derive(Debug, Clone, Default)]
pub struct AsyncConnectScan<P = TokioProber> {
    prober: Arc<P>,
}

impl<P: AsyncProber + 'static> AsyncConnectScan<P> {
    pub fn new(prober: P) -> Self {
        Self {
            prober: Arc::new(prober),
        }
    }

    pub async fn scan_async(
        &self,
        addr: IpAddr,
        ports: &[u16],
        opts: &ScanOptions,
    ) -> Result<Vec<u16>> {
        let sem = Arc::new(Semaphore::new(opts.concurrency.clamp(1, MAX_IN_FLIGHT)));
        let timeout = opts.timeout;
        let mut set = JoinSet::new();

        for &port in ports {
            let sem = sem.clone();
            let prober = Arc::clone(&self.prober);
            set.spawn(async move {
                // Hold the permit until the probe (and its socket) is gone.
                let _permit = sem
                    .acquire_owned()
                    .await
                    .map_err(|e| ScanError::Runtime(format!("semaphore closed: {e}")))?;
                prober
                    .probe(addr, port, timeout)
                    .await
                    .map(|open| open.then_some(port))
            });
        }

        let mut open = Vec::new();
        // Returning early drops the set, which aborts the remaining tasks.
        while let Some(joined) = set.join_next().await {
            let res = joined.map_err(|e| ScanError::Runtime(format!("probe task failed: {e}")))?;
            if let Some(port) = res? {
                open.push(port);
            }
        }
        Ok(finalize(open))
    }

    fn run_isolated(&self, addr: IpAddr, ports: &[u16], opts: &ScanOptions) -> Result<Vec<u16>> {
        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScanError::Runtime(format!("failed to build async runtime: {e}")))?;
        rt.block_on(self.scan_async(addr, ports, opts))
    }
}

impl<P: AsyncProber + 'static> ScanStrategy for AsyncConnectScan<P> {
    fn name(&self) -> &'static str {
        "async"
    }

    fn scan(&self, target: &ScanTarget, ports: &[u16], opts: &ScanOptions) -> Result<Vec<u16>> {
        let addr = target.addr;
        if Handle::try_current().is_ok() {
            // block_on would panic on a runtime thread; use a fresh one elsewhere.
            debug!("runtime already active, scanning on an isolated thread");
            thread::scope(|s| {
                thread::Builder::new()
                    .name("async-scan".into())
                    .spawn_scoped(s, || self.run_isolated(addr, ports, opts))
                    .map_err(|e| {
                        ScanError::Runtime(format!("failed to spawn scan thread: {e}"))
                    })?
                    .join()
                    .unwrap_or_else(|_| {
                        Err(ScanError::Runtime("async scan thread panicked".into()))
                    })
            })
        } else {
            self.run_isolated(addr, ports, opts)
        }
    }
}
