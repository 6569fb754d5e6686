//! Mini DNS - A caching DNS forwarder
//!
//! Answers queries from a TTL-bound cache, forwards misses to one upstream
//! resolver, and keeps the cache on disk across restarts.

pub mod cache;
pub mod config;
pub mod dns;
pub mod error;
pub mod forwarder;
pub mod persistence;
pub mod server;
pub mod tasks;

pub use cache::SharedCache;
pub use config::Config;
pub use error::{ResolverError, Result};
pub use forwarder::{Forwarder, UdpForwarder};
pub use persistence::PersistenceManager;
pub use server::{DnsServer, RequestHandler};
pub use tasks::{spawn_cleanup_task, spawn_persist_task};
