//! UDP transport substrate.
//!
//! Provides a tokio UDP socket that implements [`Transport`]. Each datagram
//! carries a one-byte packet type tag followed by the serialized RTP packet.
//! Sends are synchronous (`try_send_to`) so the media core never awaits;
//! reception runs in an async loop that dispatches to registered handlers.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::{debug, info, warn};

use super::{Packet, PacketHandler, PacketType, Transport};

/// Largest datagram accepted by the receive loop
const MAX_DATAGRAM_SIZE: usize = 2048;

/// UDP socket implementing the transport substrate.
///
/// # Example
///
/// ```ignore
/// use peer_rtp_common::UdpTransport;
///
/// // Async context required
/// let transport = UdpTransport::bind("0.0.0.0:5004").await.unwrap();
/// // Register handlers, then drive `transport.run()` on a task
/// ```
pub struct UdpTransport {
    // ---
    socket: UdpSocket,
    handlers: RwLock<HashMap<PacketType, PacketHandler>>,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    packets_received: AtomicU64,
    packets_dropped: AtomicU64,
}

impl UdpTransport {
    // ---
    /// Binds a UDP socket to the given local address.
    ///
    /// # Errors
    ///
    /// Returns error if socket binding fails.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        // ---
        let socket = UdpSocket::bind(addr)
            .await
            .context("failed to bind UDP socket")?;

        info!("UDP transport bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            handlers: RwLock::new(HashMap::new()),
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
        })
    }

    /// Returns the bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        // ---
        self.socket
            .local_addr()
            .context("failed to read local address")
    }

    /// Receives and dispatches a single datagram.
    ///
    /// Datagrams with an unknown tag or no registered handler are counted as
    /// dropped. Handler failures are logged and do not end reception.
    ///
    /// # Errors
    ///
    /// Returns error if network reception fails.
    pub async fn recv_once(&self) -> Result<()> {
        // ---
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        let (len, src) = self
            .socket
            .recv_from(&mut buf)
            .await
            .context("failed to receive UDP packet")?;

        self.packets_received.fetch_add(1, Ordering::Relaxed);

        let Some((&tag, body)) = buf[..len].split_first() else {
            self.packets_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Dropped empty datagram from {}", src);
            return Ok(());
        };

        let Some(kind) = PacketType::from_tag(tag) else {
            self.packets_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Dropped datagram with unknown tag 0x{:02X} from {}", tag, src);
            return Ok(());
        };

        // Clone the handler out so the lock is not held during dispatch
        let handler = self.handlers.read().get(&kind).cloned();
        let Some(handler) = handler else {
            self.packets_dropped.fetch_add(1, Ordering::Relaxed);
            debug!("No handler for {:?} packet from {}", kind, src);
            return Ok(());
        };

        let packet = Packet::new(kind, body.to_vec());
        if let Err(e) = handler(&packet, src) {
            self.packets_dropped.fetch_add(1, Ordering::Relaxed);
            warn!("Dropped {:?} packet from {}: {:#}", kind, src, e);
        }

        Ok(())
    }

    /// Runs the receive loop until reception fails.
    ///
    /// # Errors
    ///
    /// Returns error if network reception fails.
    pub async fn run(&self) -> Result<()> {
        // ---
        loop {
            self.recv_once().await?;
        }
    }

    /// Returns statistics about datagrams handled.
    ///
    /// # Returns
    ///
    /// Tuple of (packets_sent, bytes_sent, packets_received, packets_dropped)
    pub fn stats(&self) -> (u64, u64, u64, u64) {
        // ---
        (
            self.packets_sent.load(Ordering::Relaxed),
            self.bytes_sent.load(Ordering::Relaxed),
            self.packets_received.load(Ordering::Relaxed),
            self.packets_dropped.load(Ordering::Relaxed),
        )
    }
}

impl Transport for UdpTransport {
    fn send(&self, packet: &Packet, addr: SocketAddr) -> Result<()> {
        // ---
        let mut datagram = Vec::with_capacity(1 + packet.data.len());
        datagram.push(packet.kind.tag());
        datagram.extend_from_slice(&packet.data);

        let bytes = self
            .socket
            .try_send_to(&datagram, addr)
            .with_context(|| format!("failed to send {:?} packet to {}", packet.kind, addr))?;

        let sent = self.packets_sent.fetch_add(1, Ordering::Relaxed) + 1;
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);

        if sent.is_multiple_of(100) {
            debug!("Sent {} packets to peers (last to {})", sent, addr);
        }

        Ok(())
    }

    fn register_handler(&self, kind: PacketType, handler: PacketHandler) {
        // ---
        self.handlers.write().insert(kind, handler);
    }
}
