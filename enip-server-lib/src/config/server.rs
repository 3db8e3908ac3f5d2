//! Process-wide server configuration (§6, §10.2), lowered from the CLI and
//! validated before the listener binds.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::delay::DelaySpec;
use crate::config::tags::TagSpec;
use crate::error::{EnipError, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub control_address: Option<SocketAddr>,
    pub tags: Vec<TagSpec>,
    pub delay: DelaySpec,
}

/// Check invariants the listener relies on: duplicate tag names and
/// zero-size arrays are caught here rather than surfacing as a panic deep
/// in the registry (§10.2 — `EnipError::Config` is fatal at startup).
pub fn validate(config: &ServerConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for tag in &config.tags {
        if !seen.insert(&tag.name) {
            return Err(EnipError::Config(format!("duplicate tag name: {}", tag.name)));
        }
        if tag.size == 0 {
            return Err(EnipError::Config(format!("tag {:?} must have at least one element", tag.name)));
        }
    }
    Ok(())
}
