//! RAII connection bookkeeping (§4.H): removes a connection's stats entry
//! and notifies shutdown when the last connection closes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::control::ConnectionsMap;

pub struct ConnectionGuard {
    key: String,
    connections: ConnectionsMap,
    active: Arc<AtomicUsize>,
    closed_tx: watch::Sender<()>,
}

impl ConnectionGuard {
    pub fn new(key: String, connections: ConnectionsMap, active: Arc<AtomicUsize>, closed_tx: watch::Sender<()>) -> Self {
        active.fetch_add(1, Ordering::Relaxed);
        Self { key, connections, active, closed_tx }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.remove(&self.key);
        let remaining = self.active.fetch_sub(1, Ordering::Relaxed);
        if remaining == 1 {
            let _ = self.closed_tx.send(());
        }
    }
}
