//! Request Handler
//!
//! Processes one inbound datagram: decode, learn records, sweep, answer from
//! the cache or forward upstream, and hand back the reply bytes.

use std::sync::Arc;

use hickory_proto::op::Message;
use tracing::{debug, info};

use crate::cache::{CacheKey, Clock, SharedCache};
use crate::dns::codec;
use crate::error::{ResolverError, Result};
use crate::forwarder::Forwarder;

/// What the handler decided for a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Reply synthesized from cached records
    Cached(Vec<u8>),
    /// Upstream response relayed verbatim
    Forwarded(Vec<u8>),
    /// Nothing to send back (the datagram was itself a response)
    Ignored,
}

impl Outcome {
    /// Bytes to send to the client, if any.
    pub fn reply(&self) -> Option<&[u8]> {
        match self {
            Outcome::Cached(bytes) | Outcome::Forwarded(bytes) => Some(bytes),
            Outcome::Ignored => None,
        }
    }
}

/// Per-datagram request logic, shared by all request tasks.
pub struct RequestHandler {
    cache: SharedCache,
    forwarder: Arc<dyn Forwarder>,
    clock: Arc<dyn Clock>,
    cache_unsolicited: bool,
}

impl RequestHandler {
    pub fn new(cache: SharedCache, forwarder: Arc<dyn Forwarder>, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            forwarder,
            clock,
            cache_unsolicited: false,
        }
    }

    /// Also learn records carried by any inbound datagram, not just by
    /// correlated upstream answers. Off by default: any host able to reach
    /// the listening port could otherwise plant records in the cache.
    pub fn with_unsolicited_caching(mut self, enabled: bool) -> Self {
        self.cache_unsolicited = enabled;
        self
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    // == Handle ==
    /// Runs the request cycle for one datagram.
    ///
    /// Errors mean no reply must be sent for this datagram.
    pub async fn handle(&self, datagram: &[u8]) -> Result<Outcome> {
        let message = codec::decode(datagram)?;

        if self.cache_unsolicited {
            self.learn(&message).await;
        }

        if !codec::is_query(&message) {
            debug!(id = message.id(), "Ignoring inbound response");
            return Ok(Outcome::Ignored);
        }

        let key = codec::question_key(&message)
            .ok_or_else(|| ResolverError::Format("query carries no question".to_string()))?;

        let now = self.clock.now();
        let removed = self.cache.sweep_all(now).await;
        if removed > 0 {
            info!(removed, "Expired resource records removed");
        }

        match self.cache.lookup(&key, now).await {
            Some(records) => {
                debug!(key = %key, records = records.len(), "Cache hit");
                let reply = codec::build_cached_reply(&message, &records)?;
                Ok(Outcome::Cached(codec::encode(&reply)?))
            }
            None => {
                debug!(key = %key, upstream = %self.forwarder.upstream(), "Cache miss, forwarding");
                self.forward(&message, &key, datagram).await
            }
        }
    }

    async fn forward(&self, query: &Message, key: &CacheKey, datagram: &[u8]) -> Result<Outcome> {
        let raw = self.forwarder.forward(datagram).await?;
        let response = codec::decode(&raw)?;
        codec::response_matches(query, &response)?;

        // Already learned above when unsolicited caching is on
        if !self.cache_unsolicited {
            self.learn(&response).await;
        }

        debug!(key = %key, answers = response.answers().len(), "Relaying upstream answer");
        Ok(Outcome::Forwarded(raw))
    }

    async fn learn(&self, message: &Message) -> usize {
        let records = codec::observed_records(message);
        if records.is_empty() {
            return 0;
        }
        let count = records.len();
        let added = self.cache.insert_all(records, self.clock.now()).await;
        debug!(observed = count, added, "Recorded resource records");
        added
    }
}
