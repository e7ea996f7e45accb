//! OSC UDP server
//!
//! Receives datagrams on the configured port, decodes them with rosc and
//! feeds every contained message to the shared [`Translator`]. Bundles are
//! flattened in order. Undecodable datagrams are logged and skipped.

use parking_lot::Mutex;
use rosc::{OscMessage, OscPacket};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::error::Result;
use crate::translator::{Outcome, Translator};

/// Largest datagram accepted
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Counters reported when the server stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub datagrams: u64,
    pub decode_errors: u64,
    pub messages: u64,
    pub emitted: u64,
    pub rate_limited: u64,
}

impl ServerStats {
    fn record(&mut self, outcome: &Outcome) {
        self.messages += 1;
        match outcome {
            Outcome::Emitted(_) => self.emitted += 1,
            Outcome::RateLimited(_) => self.rate_limited += 1,
            _ => {}
        }
    }
}

/// Collect the messages of a packet, descending into bundles
pub fn flatten_packet(packet: OscPacket) -> Vec<OscMessage> {
    match packet {
        OscPacket::Message(msg) => vec![msg],
        OscPacket::Bundle(bundle) => bundle
            .content
            .into_iter()
            .flat_map(flatten_packet)
            .collect(),
    }
}

/// Bound OSC socket, not yet receiving
pub struct OscServer {
    socket: UdpSocket,
}

impl OscServer {
    /// Bind on all interfaces
    pub async fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await
    }

    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("OSC server listening on {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Start the receive loop on a background task
    pub fn spawn(self, translator: Arc<Mutex<Translator>>) -> ServerHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(translator, stop_rx));

        ServerHandle {
            stop_tx: Some(stop_tx),
            task,
        }
    }

    async fn run(
        self,
        translator: Arc<Mutex<Translator>>,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> ServerStats {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut stats = ServerStats::default();

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    let (len, from) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            // Windows reports ICMP port unreachable here; keep serving
                            error!("OSC receive error: {}", e);
                            continue;
                        }
                    };
                    stats.datagrams += 1;
                    trace!("OSC received {} bytes from {}", len, from);

                    let packet = match rosc::decoder::decode_udp(&buf[..len]) {
                        Ok((_, packet)) => packet,
                        Err(e) => {
                            stats.decode_errors += 1;
                            debug!("OSC decode error from {}: {:?}", from, e);
                            continue;
                        }
                    };

                    let messages = flatten_packet(packet);
                    let mut translator = translator.lock();
                    for msg in &messages {
                        let outcome = translator.handle(msg);
                        stats.record(&outcome);
                    }
                }
                _ = &mut stop_rx => break,
            }
        }

        stats
    }
}

/// Running OSC server
pub struct ServerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<ServerStats>,
}

impl ServerHandle {
    /// Stop receiving and wait for the loop to exit
    pub async fn stop(mut self) -> ServerStats {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }

        match self.task.await {
            Ok(stats) => {
                info!(
                    "OSC server stopped ({} messages, {} sent, {} rate-limited)",
                    stats.messages, stats.emitted, stats.rate_limited
                );
                stats
            }
            Err(e) => {
                error!("OSC server task failed: {}", e);
                ServerStats::default()
            }
        }
    }
}
