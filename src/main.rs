//! Mini DNS - A caching DNS forwarder
//!
//! Answers queries from a TTL-bound cache, forwards misses to one upstream
//! resolver, and keeps the cache on disk across restarts.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_dns::cache::{Clock, SystemClock};
use mini_dns::{
    spawn_cleanup_task, spawn_persist_task, Config, DnsServer, PersistenceManager,
    RequestHandler, SharedCache, UdpForwarder,
};

#[derive(Parser)]
#[command(name = "mini_dns")]
#[command(about = "Caching DNS forwarder", long_about = None)]
struct Args {
    /// Upstream resolver, `ip` or `ip:port` (overrides UPSTREAM)
    upstream: Option<String>,
}

/// Main entry point for the resolver.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables and the command line
/// 3. Restore the cache snapshot (empty cache if unavailable)
/// 4. Bind the UDP socket and start background tasks
/// 5. Serve until SIGINT/SIGTERM
/// 6. Save the cache on every exit path
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_dns=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(upstream) = args.upstream.as_deref() {
        config = config
            .with_upstream(upstream)
            .context("invalid upstream argument")?;
    }
    info!(
        listen = %config.listen_addr,
        upstream = %config.upstream,
        timeout_ms = config.upstream_timeout.as_millis() as u64,
        cache_file = %config.cache_file.display(),
        persist_interval = config.persist_interval,
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let persistence = Arc::new(PersistenceManager::new(&config.cache_file));
    let cache = SharedCache::new(persistence.load().await);

    let removed = cache.sweep_all(clock.now()).await;
    if removed > 0 {
        info!(removed, "Dropped records that expired while stopped");
    }

    let result = serve(&config, cache.clone(), clock, persistence.clone()).await;

    persistence.save(&cache).await;
    info!("Server is stopped");

    result
}

/// Runs the server until a shutdown signal, returning the loop's outcome.
async fn serve(
    config: &Config,
    cache: SharedCache,
    clock: Arc<dyn Clock>,
    persistence: Arc<PersistenceManager>,
) -> anyhow::Result<()> {
    let forwarder = Arc::new(UdpForwarder::new(config.upstream, config.upstream_timeout));
    let handler = Arc::new(
        RequestHandler::new(cache.clone(), forwarder, clock.clone())
            .with_unsolicited_caching(config.cache_unsolicited),
    );

    let mut server = DnsServer::bind(config.listen_addr, handler, config.max_in_flight)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;

    let mut tasks = vec![spawn_cleanup_task(
        cache.clone(),
        clock,
        config.cleanup_interval,
    )];
    if config.persists_inline() {
        server = server.with_inline_persistence(persistence);
    } else {
        tasks.push(spawn_persist_task(cache, persistence, config.persist_interval));
    }

    let result = server.run(shutdown_signal()).await;

    for task in tasks {
        task.abort();
    }
    warn!("Background tasks aborted");

    result.context("server loop failed")
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
