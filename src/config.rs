//! Configuration Module
//!
//! Handles loading and managing resolver configuration from environment variables.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ResolverError, Result};

/// Well-known public resolver used when nothing else is configured.
pub const DEFAULT_UPSTREAM: &str = "8.8.8.8:53";

/// Standard DNS port, assumed when an upstream is given as a bare IP.
pub const DNS_PORT: u16 = 53;

/// Resolver configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the inbound UDP socket binds to
    pub listen_addr: SocketAddr,
    /// Upstream resolver queries are forwarded to
    pub upstream: SocketAddr,
    /// Upper bound on a single upstream exchange
    pub upstream_timeout: Duration,
    /// Location of the cache snapshot
    pub cache_file: PathBuf,
    /// Seconds between debounced snapshot saves, 0 = save after every request
    pub persist_interval: u64,
    /// Background sweep interval in seconds
    pub cleanup_interval: u64,
    /// Maximum number of datagrams handled concurrently
    pub max_in_flight: usize,
    /// Learn records from any inbound datagram, not only from correlated upstream answers
    pub cache_unsolicited: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LISTEN_ADDR` - Inbound UDP address (default: 0.0.0.0:53)
    /// - `UPSTREAM` - Upstream resolver, `ip` or `ip:port` (default: 8.8.8.8:53)
    /// - `UPSTREAM_TIMEOUT_MS` - Upstream timeout in milliseconds (default: 3000)
    /// - `CACHE_FILE` - Snapshot path (default: dns_cache.json)
    /// - `PERSIST_INTERVAL` - Snapshot debounce in seconds (default: 5)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 30)
    /// - `MAX_IN_FLIGHT` - Concurrent request bound (default: 256)
    /// - `CACHE_UNSOLICITED` - Learn records from any sender (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: env::var("LISTEN_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.listen_addr),
            upstream: env::var("UPSTREAM")
                .ok()
                .and_then(|v| parse_upstream(&v).ok())
                .unwrap_or(defaults.upstream),
            upstream_timeout: env::var("UPSTREAM_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.upstream_timeout),
            cache_file: env::var("CACHE_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_file),
            persist_interval: env::var("PERSIST_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.persist_interval),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.cleanup_interval),
            max_in_flight: env::var("MAX_IN_FLIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_in_flight),
            cache_unsolicited: env::var("CACHE_UNSOLICITED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_unsolicited),
        }
    }

    /// Applies the upstream given on the command line.
    ///
    /// Unlike environment values, an unparsable address here is an error.
    pub fn with_upstream(mut self, upstream: &str) -> Result<Self> {
        self.upstream = parse_upstream(upstream)?;
        Ok(self)
    }

    /// Returns true when snapshots are written inline after each request.
    pub fn persists_inline(&self) -> bool {
        self.persist_interval == 0
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DNS_PORT)),
            upstream: SocketAddr::from(([8, 8, 8, 8], DNS_PORT)),
            upstream_timeout: Duration::from_millis(3000),
            cache_file: PathBuf::from("dns_cache.json"),
            persist_interval: 5,
            cleanup_interval: 30,
            max_in_flight: 256,
            cache_unsolicited: false,
        }
    }
}

/// Parses an upstream resolver address, accepting `ip` or `ip:port`.
pub fn parse_upstream(value: &str) -> Result<SocketAddr> {
    let value = value.trim();

    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }

    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| ResolverError::Config(format!("invalid upstream address: {value}")))
}
