//! Single-port TCP connect probes.
//!
//! A probe answers one question: did `(addr, port)` accept a TCP connection
//! within the timeout? Refused, timed-out and unreachable attempts all read
//! as "not open". Only transport failures outside that set are returned as
//! errors, so resource exhaustion and similar bugs are not masked.

use std::io::{self, ErrorKind};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::{Result, ScanError};

/// Tests one `(addr, port)` pair. Implementations must release the socket on
/// every exit path.
pub trait Prober: Send + Sync {
    fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> Result<bool>;
}

impl<P: Prober + ?Sized> Prober for Arc<P> {
    fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> Result<bool> {
        Prober::probe(&**self, addr, port, timeout)
    }
}

/// Blocking connect through `std::net::TcpStream::connect_timeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

impl Prober for TcpProber {
    fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> Result<bool> {
        let target = SocketAddr::new(addr, port);
        // The stream is dropped (closed) at the end of the match arm.
        match std::net::TcpStream::connect_timeout(&target, timeout) {
            Ok(_stream) => Ok(true),
            Err(e) => classify(port, e),
        }
    }
}

/// Lower-level probe: builds the socket itself and inspects the connect
/// status directly instead of going through a stream type.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketProber;

impl Prober for SocketProber {
    fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> Result<bool> {
        let target = SocketAddr::new(addr, port);
        let socket = Socket::new(Domain::for_address(target), Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| ScanError::Probe { port, source })?;
        match socket.connect_timeout(&SockAddr::from(target), timeout) {
            Ok(()) => Ok(true),
            Err(e) => classify(port, e),
        }
    }
}

/// Async counterpart of [`Prober`], used by the cooperative scan.
#[async_trait]
pub trait AsyncProber: Send + Sync {
    async fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> Result<bool>;
}

#[async_trait]
impl<P: AsyncProber + ?Sized> AsyncProber for Arc<P> {
    async fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> Result<bool> {
        AsyncProber::probe(&**self, addr, port, timeout).await
    }
}

/// tokio `TcpStream::connect` wrapped in a timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProber;

#[async_trait]
impl AsyncProber for TokioProber {
    async fn probe(&self, addr: IpAddr, port: u16, timeout: Duration) -> Result<bool> {
        probe_async(addr, port, timeout).await
    }
}

/// Async connect on the ambient tokio runtime. The timeout covers only the
/// connection attempt.
pub async fn probe_async(addr: IpAddr, port: u16, timeout: Duration) -> Result<bool> {
    let target = SocketAddr::new(addr, port);
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => Ok(true),
        Ok(Err(e)) => classify(port, e),
        Err(_elapsed) => Ok(false),
    }
}

/// Fold expected connect failures into `Ok(false)`; anything else is fatal.
pub(crate) fn classify(port: u16, err: io::Error) -> Result<bool> {
    if is_closed_signal(&err) {
        Ok(false)
    } else {
        Err(ScanError::Probe { port, source: err })
    }
}

fn is_closed_signal(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut
            | ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
            | ErrorKind::NetworkDown
            | ErrorKind::AddrNotAvailable
            | ErrorKind::PermissionDenied
    )
}
