//! Startup checks for configuration and UDP addresses.

use anyhow::{Context, Result};
use std::net::SocketAddr;

use crate::config::LinkConfig;

pub fn check_link_config(cfg: &LinkConfig) -> Result<()> {
    cfg.validate().context("link config")?;
    Ok(())
}

pub fn check_udp(bind: &str, peer: &str) -> Result<(SocketAddr, SocketAddr)> {
    let bind: SocketAddr = bind.parse().with_context(|| format!("udp.bind invalid: {}", bind))?;
    let peer: SocketAddr = peer.parse().with_context(|| format!("udp.peer invalid: {}", peer))?;
    anyhow::ensure!(!peer.ip().is_unspecified(), "udp.peer must be a concrete address");
    anyhow::ensure!(peer.port() != 0, "udp.peer port must be non-zero");
    Ok((bind, peer))
}
