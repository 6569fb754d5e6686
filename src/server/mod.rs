//! Server Module
//!
//! Owns the inbound UDP socket for the whole process lifetime and runs each
//! datagram through the `RequestHandler` in its own task.

mod handler;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::dns::MAX_DNS_PACKET_SIZE;
use crate::error::{ResolverError, Result};
use crate::persistence::PersistenceManager;

pub use handler::{Outcome, RequestHandler};

/// How long shutdown waits for requests already being served.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// UDP front end of the resolver.
pub struct DnsServer {
    socket: Arc<UdpSocket>,
    handler: Arc<RequestHandler>,
    limit: Arc<Semaphore>,
    /// Set when snapshots are written after every answered request
    inline_persistence: Option<Arc<PersistenceManager>>,
}

impl DnsServer {
    /// Binds the listening socket. It stays bound until the server is dropped.
    pub async fn bind(
        addr: SocketAddr,
        handler: Arc<RequestHandler>,
        max_in_flight: usize,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            handler,
            limit: Arc::new(Semaphore::new(max_in_flight.max(1))),
            inline_persistence: None,
        })
    }

    /// Saves the cache after each request that produced a reply.
    pub fn with_inline_persistence(mut self, persistence: Arc<PersistenceManager>) -> Self {
        self.inline_persistence = Some(persistence);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    // == Run ==
    /// Receives datagrams until `shutdown` completes.
    ///
    /// A failure inside one request is logged and confined to that request's
    /// task. Only errors of the receive loop itself end the server. On
    /// shutdown, requests in flight get up to `DRAIN_TIMEOUT` to finish so
    /// their answers reach the cache before it is saved.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!(addr = %self.local_addr()?, "DNS server listening");
        tokio::pin!(shutdown);

        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
        let mut in_flight = JoinSet::new();

        loop {
            while let Some(result) = in_flight.try_join_next() {
                log_task_result(result);
            }

            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (len, src) = tokio::select! {
                _ = &mut shutdown => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(r) => r,
                    Err(e) => {
                        // ICMP errors from earlier sends surface here on some platforms
                        warn!(error = %e, "UDP recv error");
                        continue;
                    }
                },
            };

            let datagram = buf[..len].to_vec();
            let socket = self.socket.clone();
            let handler = self.handler.clone();
            let persistence = self.inline_persistence.clone();

            in_flight.spawn(async move {
                let _permit = permit;
                serve_datagram(&socket, &handler, persistence.as_deref(), &datagram, src).await;
            });
        }

        info!(pending = in_flight.len(), "DNS server stopped receiving");

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while let Some(result) = in_flight.join_next().await {
                log_task_result(result);
            }
        })
        .await;
        if drained.is_err() {
            warn!(pending = in_flight.len(), "Abandoning requests still in flight");
            in_flight.abort_all();
        }

        Ok(())
    }
}

fn log_task_result(result: std::result::Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "Request task panicked");
        }
    }
}

/// Handles one datagram end to end: answer, reply, persist.
async fn serve_datagram(
    socket: &UdpSocket,
    handler: &RequestHandler,
    persistence: Option<&PersistenceManager>,
    datagram: &[u8],
    src: SocketAddr,
) {
    let outcome = match handler.handle(datagram).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log_request_error(&e, src);
            return;
        }
    };

    let Some(reply) = outcome.reply() else {
        return;
    };

    if let Err(e) = socket.send_to(reply, src).await {
        warn!(client = %src, error = %e, "Failed to send reply");
        return;
    }
    debug!(
        client = %src,
        bytes = reply.len(),
        cached = matches!(outcome, Outcome::Cached(_)),
        "Reply sent"
    );

    if let Some(persistence) = persistence {
        persistence.save_if_dirty(handler.cache()).await;
    }
}

fn log_request_error(err: &ResolverError, src: SocketAddr) {
    match err {
        ResolverError::Format(_) | ResolverError::UnexpectedResponse(_) => {
            warn!(client = %src, kind = err.kind(), error = %err, "Dropping malformed message");
        }
        ResolverError::UpstreamTimeout { .. } | ResolverError::UpstreamUnreachable { .. } => {
            warn!(client = %src, kind = err.kind(), error = %err, "Cannot ask upstream");
        }
        _ => {
            error!(client = %src, kind = err.kind(), error = %err, "Request failed");
        }
    }
}
