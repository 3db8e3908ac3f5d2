//! Server listener (§4.H): binds the data-plane socket, spawns one session
//! task per accepted connection, and owns the shared tag registry,
//! connections map, and delay knob.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cip::TagRegistry;
use crate::config::ServerConfig;
use crate::control::{ConnectionsMap, Delay};
use crate::error::{EnipError, Result};
use crate::server::guard::ConnectionGuard;
use crate::session::{self, SessionHandles};

/// How long a graceful shutdown waits for in-flight sessions to finish
/// before giving up and exiting anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn build_registry(config: &ServerConfig) -> std::result::Result<TagRegistry, EnipError> {
    let mut registry = TagRegistry::new();
    for tag in &config.tags {
        info!(name = %tag.name, cip_type = ?tag.cip_type, size = tag.size, "registering tag");
        registry
            .create(tag.name.clone(), tag.cip_type, tag.size, tag.default_value())
            .map_err(|e| EnipError::Config(e.to_string()))?;
    }
    Ok(registry)
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let registry = Arc::new(build_registry(&config)?);
    let connections = ConnectionsMap::new();
    let handles = Arc::new(SessionHandles::new());
    let delay = Arc::new(Delay::new(0.0));

    tokio::spawn(crate::control::options::run_mutator(delay.clone(), config.delay));

    if let Some(control_addr) = config.control_address {
        let state = crate::control::http::ControlState {
            tags: registry.clone(),
            connections: connections.clone(),
            delay: delay.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = crate::control::http::run(control_addr, state).await {
                warn!(error = %e, "control plane exited");
            }
        });
    }

    let listener = TcpListener::bind(config.address).await.map_err(EnipError::Bind)?;
    info!(address = %config.address, tags = registry.len(), "enip server listening");

    let active_connections = Arc::new(AtomicUsize::new(0));
    let (closed_tx, mut closed_rx) = watch::channel(());

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| EnipError::Bind(std::io::Error::other(format!("failed to install SIGTERM handler: {e}"))))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| EnipError::Bind(std::io::Error::other(format!("failed to install SIGINT handler: {e}"))))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };
                let (key, peer_stats) = connections.register(peer);
                let guard = ConnectionGuard::new(key, connections.clone(), active_connections.clone(), closed_tx.clone());
                let registry = registry.clone();
                let handles = handles.clone();
                let delay = delay.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    session::run(stream, registry, handles, peer_stats, delay).await;
                });
            }
        }
    }

    connections.force_close_all();
    if active_connections.load(Ordering::Relaxed) > 0 {
        info!(active = active_connections.load(Ordering::Relaxed), "waiting for sessions to finish");
        tokio::select! {
            _ = closed_rx.changed() => {}
            _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
                let remaining = active_connections.load(Ordering::Relaxed);
                if remaining > 0 {
                    warn!(remaining, "shutdown grace period elapsed with sessions still active");
                }
            }
        }
    }
    info!("enip server stopped");
    Ok(())
}
