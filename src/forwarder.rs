//! Upstream Forwarder
//!
//! Relays a client's query bytes, unmodified, to the configured upstream
//! resolver and waits a bounded time for the answer.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

use crate::dns::MAX_DNS_PACKET_SIZE;
use crate::error::{ResolverError, Result};

/// Sends a raw query upstream and returns the raw response.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Fails with `UpstreamTimeout` or `UpstreamUnreachable`.
    async fn forward(&self, query: &[u8]) -> Result<Vec<u8>>;

    /// Address queries are sent to, for logging.
    fn upstream(&self) -> SocketAddr;
}

/// Forwarder over UDP, one ephemeral socket per query.
///
/// The socket is connected to the upstream, so the kernel discards datagrams
/// from any other source. Replies with a different transaction id are
/// ignored until the deadline.
#[derive(Debug, Clone)]
pub struct UdpForwarder {
    upstream: SocketAddr,
    timeout: Duration,
}

impl UdpForwarder {
    pub fn new(upstream: SocketAddr, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    fn unreachable(&self, err: std::io::Error) -> ResolverError {
        ResolverError::UpstreamUnreachable {
            upstream: self.upstream,
            reason: err.to_string(),
        }
    }

    fn timed_out(&self) -> ResolverError {
        ResolverError::UpstreamTimeout {
            upstream: self.upstream,
            timeout: self.timeout,
        }
    }

    async fn exchange(&self, socket: &UdpSocket, query: &[u8], query_id: [u8; 2]) -> Result<Vec<u8>> {
        socket.send(query).await.map_err(|e| self.unreachable(e))?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];

        loop {
            let len = tokio::time::timeout_at(deadline, socket.recv(&mut buf))
                .await
                .map_err(|_| self.timed_out())?
                .map_err(|e| self.unreachable(e))?;

            if len >= 2 && buf[..2] == query_id {
                buf.truncate(len);
                return Ok(buf);
            }

            debug!(
                upstream = %self.upstream,
                bytes = len,
                "Discarding upstream datagram with foreign transaction id"
            );
        }
    }
}

#[async_trait]
impl Forwarder for UdpForwarder {
    async fn forward(&self, query: &[u8]) -> Result<Vec<u8>> {
        let query_id: [u8; 2] = query
            .get(..2)
            .and_then(|id| id.try_into().ok())
            .ok_or_else(|| ResolverError::Format("query shorter than a header".to_string()))?;

        let bind_addr: SocketAddr = if self.upstream.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| self.unreachable(e))?;
        socket
            .connect(self.upstream)
            .await
            .map_err(|e| self.unreachable(e))?;

        let started = Instant::now();
        let response = self.exchange(&socket, query, query_id).await?;

        debug!(
            upstream = %self.upstream,
            bytes = response.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream answered"
        );
        Ok(response)
    }

    fn upstream(&self) -> SocketAddr {
        self.upstream
    }
}
