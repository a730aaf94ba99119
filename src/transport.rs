//! The byte-stream transport contract and a concrete TCP implementation
//! of it.
//!
//! The transport is a pluggable collaborator defined only by its contract
//! (`listen`/`accept`/`connect`/`send`/`recv`/`recv-until`/`flush`/`close`,
//! each deadline-aware): this module defines that contract as the
//! [`Transport`] trait and ships the one implementation `wsmill` needs,
//! plain TCP over `tokio::net::TcpStream`. Everything above this module
//! (`handshake`, `frame`, `connection`, `listener`) is generic over
//! `Transport`, so a caller could plug in a TLS-wrapped stream without
//! touching protocol logic, without this crate shipping a TLS variant
//! itself.

use std::future::Future;
use std::io;
use std::sync::OnceLock;
use std::time::{Duration, Instant as StdInstant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::time::Instant;

static EPOCH: OnceLock<StdInstant> = OnceLock::new();

fn epoch() -> StdInstant {
    *EPOCH.get_or_init(StdInstant::now)
}

/// The current time in the same monotonic-millisecond space that
/// [`Deadline::from_millis`] expects. Exposed so callers can build
/// deadlines the way the wire spec describes them ("absolute monotonic
/// milliseconds").
pub fn now_ms() -> i64 {
    epoch().elapsed().as_millis() as i64
}

/// An absolute deadline, or "no deadline" (spec: negative milliseconds).
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Never expires.
    pub fn infinite() -> Self {
        Deadline(None)
    }

    /// Expires after `dur` from now.
    pub fn after(dur: Duration) -> Self {
        Deadline(Some(Instant::now() + dur))
    }

    /// Construct from an absolute monotonic-millisecond timestamp;
    /// negative means infinite.
    pub fn from_millis(ms: i64) -> Self {
        if ms < 0 {
            return Deadline::infinite();
        }
        let delta = ms.saturating_sub(now_ms()).max(0) as u64;
        Deadline(Some(Instant::now() + Duration::from_millis(delta)))
    }

    pub(crate) async fn race<T, F>(&self, fut: F) -> io::Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        match self.0 {
            None => fut.await,
            Some(instant) => match tokio::time::timeout_at(instant, fut).await {
                Ok(res) => res,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "deadline expired")),
            },
        }
    }
}

/// The byte-stream transport contract: buffered send, blocking-until-full
/// recv, read-until-delimiter, flush, and close, each racing an absolute
/// [`Deadline`].
pub trait Transport: Sized + Send + Unpin {
    /// Send the whole buffer, buffered; caller calls [`Transport::flush`]
    /// to push it out.
    fn send(
        &mut self,
        buf: &[u8],
        deadline: Deadline,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Block until `buf` is completely filled or the deadline/connection
    /// fails. A zero-length `buf` is used to drain-and-discard exactly
    /// zero bytes (callers that want to discard N bytes pass a scratch
    /// buffer of that length).
    fn recv(
        &mut self,
        buf: &mut [u8],
        deadline: Deadline,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Read bytes one at a time into `buf` until `delim` is seen (included
    /// in the count) or `max` bytes have been read without finding it.
    fn recv_until(
        &mut self,
        buf: &mut Vec<u8>,
        max: usize,
        delim: u8,
        deadline: Deadline,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    fn flush(&mut self, deadline: Deadline) -> impl Future<Output = io::Result<()>> + Send;

    fn close(self) -> impl Future<Output = io::Result<()>> + Send;
}

/// A plain TCP transport.
#[derive(Debug)]
pub struct TcpTransport(TcpStream);

impl TcpTransport {
    pub async fn connect<A: ToSocketAddrs>(addr: A, deadline: Deadline) -> io::Result<Self> {
        let stream = deadline.race(TcpStream::connect(addr)).await?;
        stream.set_nodelay(true).ok();
        Ok(TcpTransport(stream))
    }
}

impl Transport for TcpTransport {
    async fn send(&mut self, buf: &[u8], deadline: Deadline) -> io::Result<usize> {
        deadline.race(async { self.0.write_all(buf).await.map(|_| buf.len()) }).await
    }

    async fn recv(&mut self, buf: &mut [u8], deadline: Deadline) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        deadline.race(async { self.0.read_exact(buf).await }).await
    }

    async fn recv_until(
        &mut self,
        buf: &mut Vec<u8>,
        max: usize,
        delim: u8,
        deadline: Deadline,
    ) -> io::Result<usize> {
        deadline
            .race(async {
                let mut byte = [0u8; 1];
                let mut n = 0usize;
                loop {
                    if n >= max {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "recv_until: max reached before delimiter",
                        ));
                    }
                    self.0.read_exact(&mut byte).await?;
                    buf.push(byte[0]);
                    n += 1;
                    if byte[0] == delim {
                        return Ok(n);
                    }
                }
            })
            .await
    }

    async fn flush(&mut self, deadline: Deadline) -> io::Result<()> {
        deadline.race(async { self.0.flush().await }).await
    }

    async fn close(mut self) -> io::Result<()> {
        self.0.shutdown().await
    }
}

/// A TCP listener producing [`TcpTransport`] connections.
#[derive(Debug)]
pub struct TcpListenerTransport(TcpListener);

impl TcpListenerTransport {
    pub async fn bind<A: ToSocketAddrs>(addr: A, _backlog: i32) -> io::Result<Self> {
        Ok(TcpListenerTransport(TcpListener::bind(addr).await?))
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.0.local_addr()
    }

    pub async fn accept(&mut self, deadline: Deadline) -> io::Result<TcpTransport> {
        let (stream, _peer) = deadline.race(self.0.accept()).await?;
        stream.set_nodelay(true).ok();
        Ok(TcpTransport(stream))
    }
}
