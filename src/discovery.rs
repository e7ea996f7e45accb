//! LAN discovery broadcast
//!
//! The remote app finds the companion by listening for a UDP broadcast of
//! `"<prefix>:<ipv4>"` on a well-known port. The announcement is sent once at
//! startup and then on a fixed interval until stopped.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::error::{CompanionError, Result};

/// Destination used to pick the outbound interface; nothing is sent to it
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Broadcast parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    pub prefix: String,
    pub port: u16,
    pub interval: Duration,
}

impl From<&NetworkConfig> for BroadcastConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            prefix: network.announce_prefix.clone(),
            port: network.broadcast_port,
            interval: Duration::from_millis(network.broadcast_interval_ms),
        }
    }
}

/// Format the announcement payload
pub fn announcement(prefix: &str, ip: Ipv4Addr) -> String {
    format!("{}:{}", prefix, ip)
}

/// First non-loopback IPv4 address of this host
///
/// Connecting a UDP socket only selects a route, so this works without
/// sending traffic. Fails with [`CompanionError::NoNetwork`] when no IPv4
/// route exists.
pub fn local_ipv4() -> Result<Ipv4Addr> {
    let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket
        .connect(ROUTE_PROBE_ADDR)
        .map_err(|_| CompanionError::NoNetwork)?;

    match socket.local_addr()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Ok(ip),
        _ => Err(CompanionError::NoNetwork),
    }
}

/// Whether the host has a usable network connection
pub fn network_available() -> bool {
    local_ipv4().is_ok()
}

/// Running broadcast task
pub struct BroadcastHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<u64>,
}

impl BroadcastHandle {
    /// Stop broadcasting and wait for the task to finish.
    /// Returns the number of announcements sent.
    pub async fn stop(mut self) -> u64 {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }

        match self.task.await {
            Ok(sent) => {
                info!("Stopped discovery broadcast ({} announcements sent)", sent);
                sent
            }
            Err(e) => {
                warn!("Discovery broadcast task failed: {}", e);
                0
            }
        }
    }
}

/// Start announcing this host to `255.255.255.255:<port>`
pub async fn start_broadcast(config: BroadcastConfig) -> Result<BroadcastHandle> {
    let target = SocketAddr::from((Ipv4Addr::BROADCAST, config.port));
    start_broadcast_to(config, target).await
}

/// Start announcing to an explicit destination
pub async fn start_broadcast_to(
    config: BroadcastConfig,
    target: SocketAddr,
) -> Result<BroadcastHandle> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;

    let ip = local_ipv4()?;
    info!("Starting broadcast of companion local IP: {}", ip);

    let (stop_tx, mut stop_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut ticker = interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sent = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Re-resolve each tick so a changed address is picked up
                    let ip = match local_ipv4() {
                        Ok(ip) => ip,
                        Err(e) => {
                            warn!("Skipping discovery broadcast: {}", e);
                            continue;
                        }
                    };

                    let payload = announcement(&config.prefix, ip);
                    match socket.send_to(payload.as_bytes(), target).await {
                        Ok(_) => {
                            sent += 1;
                            debug!("Broadcast '{}' to {}", payload, target);
                        }
                        Err(e) => warn!("Discovery broadcast to {} failed: {}", target, e),
                    }
                }
                _ = &mut stop_rx => break,
            }
        }

        sent
    });

    Ok(BroadcastHandle {
        stop_tx: Some(stop_tx),
        task,
    })
}
