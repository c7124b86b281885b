use std::net::{IpAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use portsweep::prober::{AsyncProber, Prober};
use portsweep::strategy::{AsyncConnectScan, PoolScan, ScanStrategy, ThreaderScan};
use portsweep::{
    scan_target, ScanError, ScanMethod, ScanOptions, ScanRequest, ScanTarget, Scanner,
    ScannerConfig,
};

const LOCAL_METHODS: [ScanMethod; 3] = [
    ScanMethod::Default,
    ScanMethod::Threader,
    ScanMethod::Async,
];

fn listener() -> (TcpListener, u16) {
    let l = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = l.local_addr().unwrap().port();
    (l, port)
}

fn closed_port() -> u16 {
    listener().1
}

#[test]
fn every_local_method_finds_listener() {
    let (_l, port) = listener();
    for method in LOCAL_METHODS {
        let req = ScanRequest::new("localhost").ports(vec![port]).method(method);
        let outcome = scan_target(&req).unwrap();
        assert_eq!(outcome.ports, vec![port], "method {method}");
        assert_eq!(outcome.target, "localhost");
        assert_eq!(outcome.method, method);
    }
}

#[test]
fn closed_port_yields_empty_list() {
    let port = closed_port();
    for method in LOCAL_METHODS {
        let req = ScanRequest::new("127.0.0.1").ports(vec![port]).method(method);
        assert!(scan_target(&req).unwrap().ports.is_empty(), "method {method}");
    }
}

#[test]
fn high_port_without_listener() {
    let outcome = scan_target(&ScanRequest::new("localhost").ports(vec![65534])).unwrap();
    assert_eq!(outcome.ports, Vec::<u16>::new());
    assert_eq!(outcome.summary(), "No open ports found on localhost");
}

#[test]
fn output_is_sorted_and_unique() {
    let (_a, pa) = listener();
    let (_b, pb) = listener();
    let (_c, pc) = listener();
    let closed = closed_port();
    let ports = vec![pc, pa, closed, pb, pa, pc];
    let mut expected = vec![pa, pb, pc];
    expected.sort_unstable();

    for method in LOCAL_METHODS {
        let req = ScanRequest::new("127.0.0.1").ports(ports.clone()).method(method);
        let outcome = scan_target(&req).unwrap();
        assert_eq!(outcome.ports, expected, "method {method}");
        assert_eq!(outcome.scanned, 4);
    }
}

#[test]
fn repeated_scans_agree() {
    let (_l, port) = listener();
    let req = ScanRequest::new("127.0.0.1").ports(vec![port, closed_port()]);
    let first = scan_target(&req).unwrap().ports;
    let second = scan_target(&req).unwrap().ports;
    assert_eq!(first, second);
}

#[test]
fn last_target_tracks_every_call() {
    let mut scanner = Scanner::default();
    assert_eq!(scanner.last_target(), None);

    let port = closed_port();
    scanner
        .scan(&ScanRequest::new("127.0.0.1").ports(vec![port]))
        .unwrap();
    assert_eq!(scanner.last_target(), Some("127.0.0.1"));

    // Failing requests still record their target.
    let err = scanner
        .scan(&ScanRequest::new("localhost").ports(Vec::<u16>::new()))
        .unwrap_err();
    assert!(matches!(err, ScanError::InvalidInput(_)));
    assert_eq!(scanner.last_target(), Some("localhost"));

    let err = scanner
        .scan(
            &ScanRequest::new("no-such-host.invalid")
                .ports(vec![80])
                .method(ScanMethod::Async),
        )
        .unwrap_err();
    assert!(matches!(err, ScanError::Resolve { .. }));
    assert_eq!(scanner.last_target(), Some("no-such-host.invalid"));
}

#[test]
fn last_target_matches_outcome_target() {
    let mut scanner = Scanner::default();
    let outcome = scanner
        .scan(&ScanRequest::new("  127.0.0.1 ").ports(vec![closed_port()]))
        .unwrap();
    assert_eq!(outcome.target, "127.0.0.1");
    assert_eq!(scanner.last_target(), Some(outcome.target.as_str()));
}

#[test]
fn input_errors_fail_fast() {
    let cases = [
        ScanRequest::new(""),
        ScanRequest::new("127.0.0.1").ports(vec![0]),
        ScanRequest::new("127.0.0.1").timeout(Duration::ZERO),
        ScanRequest::new("127.0.0.1").concurrency(0),
    ];
    for req in cases {
        assert!(
            matches!(scan_target(&req), Err(ScanError::InvalidInput(_))),
            "{req:?}"
        );
    }
}

#[test]
fn nmap_method_without_binary_returns_empty() {
    let mut scanner = Scanner::new(ScannerConfig {
        nmap_path: "/nonexistent/nmap".into(),
    });
    let req = ScanRequest::new("127.0.0.1")
        .ports(vec![22])
        .method(ScanMethod::Nmap);
    let outcome = scanner.scan(&req).unwrap();
    assert!(outcome.ports.is_empty());
    assert!(!scanner.external_tool().is_available());
}

#[tokio::test]
async fn async_method_inside_running_runtime() {
    let (_l, port) = listener();
    let req = ScanRequest::new("127.0.0.1")
        .ports(vec![port])
        .method(ScanMethod::Async);
    assert_eq!(scan_target(&req).unwrap().ports, vec![port]);
}

/// Counts probes in flight and remembers the peak.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Prober for InFlight {
    fn probe(&self, _addr: IpAddr, port: u16, _timeout: Duration) -> portsweep::Result<bool> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(port % 10 == 0)
    }
}

#[async_trait]
impl AsyncProber for InFlight {
    async fn probe(&self, _addr: IpAddr, port: u16, _timeout: Duration) -> portsweep::Result<bool> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(port % 10 == 0)
    }
}

fn local_target() -> ScanTarget {
    ScanTarget::resolve("127.0.0.1").unwrap()
}

#[test]
fn pool_respects_worker_bound() {
    let counter = Arc::new(InFlight::default());
    let scan = PoolScan::new(counter.clone());
    let ports: Vec<u16> = (1..=60).collect();
    let opts = ScanOptions {
        concurrency: 4,
        ..ScanOptions::default()
    };
    let open = scan.scan(&local_target(), &ports, &opts).unwrap();
    assert_eq!(open, vec![10, 20, 30, 40, 50, 60]);
    let peak = counter.peak.load(Ordering::SeqCst);
    assert!(peak <= 4 && peak >= 1, "peak {peak}");
}

#[test]
fn threader_respects_thread_bound() {
    let counter = Arc::new(InFlight::default());
    let scan = ThreaderScan::new(counter.clone());
    let ports: Vec<u16> = (1..=60).collect();
    let opts = ScanOptions {
        concurrency: 3,
        ..ScanOptions::default()
    };
    let open = scan.scan(&local_target(), &ports, &opts).unwrap();
    assert_eq!(open, vec![10, 20, 30, 40, 50, 60]);
    let peak = counter.peak.load(Ordering::SeqCst);
    assert!(peak <= 3 && peak >= 1, "peak {peak}");
}

#[test]
fn async_respects_concurrency_bound() {
    let counter = Arc::new(InFlight::default());
    let scan = AsyncConnectScan::new(counter.clone());
    let ports: Vec<u16> = (1..=60).collect();
    let opts = ScanOptions {
        concurrency: 5,
        ..ScanOptions::default()
    };
    let open = scan.scan(&local_target(), &ports, &opts).unwrap();
    assert_eq!(open, vec![10, 20, 30, 40, 50, 60]);
    let peak = counter.peak.load(Ordering::SeqCst);
    assert!(peak <= 5 && peak >= 1, "peak {peak}");
}
