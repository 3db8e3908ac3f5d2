//! Per-connection stats (§3 `ConnectionStats`, §4.H): a process-wide map
//! keyed by `"<ip>_<port>"`, read by the control plane and written by the
//! session that owns each entry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// One peer's counters. `eof` is the control plane's kill-switch: setting it
/// true causes the owning session to exit at its next refill boundary (§5).
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub requests: AtomicU64,
    pub received: AtomicU64,
    pub processed: AtomicU64,
    pub eof: AtomicBool,
}

impl ConnectionStats {
    pub fn should_close(&self) -> bool {
        self.eof.load(Ordering::Relaxed)
    }

    pub fn force_close(&self) {
        self.eof.store(true, Ordering::Relaxed);
    }
}

/// Stats-map key convention: dots replaced with underscores, joined with the
/// port by an underscore (§4.H), e.g. `192_168_0_5_51342`.
pub fn stats_key(peer: SocketAddr) -> String {
    format!("{}_{}", peer.ip().to_string().replace('.', "_").replace(':', "_"), peer.port())
}

#[derive(Debug, Default, Clone)]
pub struct ConnectionsMap {
    inner: Arc<RwLock<HashMap<String, Arc<ConnectionStats>>>>,
}

impl ConnectionsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, peer: SocketAddr) -> (String, Arc<ConnectionStats>) {
        let key = stats_key(peer);
        let entry = Arc::new(ConnectionStats::default());
        self.inner.write().expect("connections map lock poisoned").insert(key.clone(), entry.clone());
        (key, entry)
    }

    pub fn remove(&self, key: &str) {
        self.inner.write().expect("connections map lock poisoned").remove(key);
    }

    pub fn get(&self, key: &str) -> Option<Arc<ConnectionStats>> {
        self.inner.read().expect("connections map lock poisoned").get(key).cloned()
    }

    pub fn keys_matching(&self, glob: &str) -> Vec<String> {
        self.inner
            .read()
            .expect("connections map lock poisoned")
            .keys()
            .filter(|k| crate::control::glob_match(glob, k))
            .cloned()
            .collect()
    }

    /// Force every currently-registered connection closed (§4.H graceful shutdown).
    pub fn force_close_all(&self) {
        for stats in self.inner.read().expect("connections map lock poisoned").values() {
            stats.force_close();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("connections map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
