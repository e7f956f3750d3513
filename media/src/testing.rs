//! In-memory collaborators for tests and simulations.
//!
//! [`RecordingTransport`] stands in for the transport substrate: it records
//! every send, can be told to fail, and can push inbound packets into the
//! handlers registered with it.

use parking_lot::Mutex;
use peer_rtp_common::{Packet, PacketHandler, PacketType, SsrcProvider, Transport};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// SSRC provider that always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedSsrc(pub u32);

impl SsrcProvider for FixedSsrc {
    fn generate_ssrc(&self) -> anyhow::Result<u32> {
        // ---
        Ok(self.0)
    }
}

/// Transport that records sends instead of touching the network.
#[derive(Default)]
pub struct RecordingTransport {
    // ---
    sent: Mutex<Vec<(Packet, SocketAddr)>>,
    handlers: Mutex<HashMap<PacketType, PacketHandler>>,
    registrations: AtomicUsize,

    /// When set, every `send` fails without recording
    pub fail_sends: AtomicBool,
}

impl RecordingTransport {
    // ---
    /// Snapshot of every packet sent so far.
    pub fn sent(&self) -> Vec<(Packet, SocketAddr)> {
        // ---
        self.sent.lock().clone()
    }

    /// Drains the recorded packets.
    pub fn take_sent(&self) -> Vec<(Packet, SocketAddr)> {
        // ---
        std::mem::take(&mut *self.sent.lock())
    }

    /// Number of `register_handler` calls received.
    pub fn registrations(&self) -> usize {
        // ---
        self.registrations.load(Ordering::SeqCst)
    }

    /// Feeds an inbound packet to the handler registered for its type.
    ///
    /// # Errors
    ///
    /// Returns error if no handler is registered or the handler fails.
    pub fn deliver(&self, packet: &Packet, from: SocketAddr) -> anyhow::Result<()> {
        // ---
        let handler = self.handlers.lock().get(&packet.kind).cloned();
        match handler {
            Some(handler) => handler(packet, from),
            None => anyhow::bail!("no handler registered for {:?}", packet.kind),
        }
    }
}

impl Transport for RecordingTransport {
    fn send(&self, packet: &Packet, addr: SocketAddr) -> anyhow::Result<()> {
        // ---
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("simulated transport failure");
        }
        self.sent.lock().push((packet.clone(), addr));
        Ok(())
    }

    fn register_handler(&self, kind: PacketType, handler: PacketHandler) {
        // ---
        self.registrations.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().insert(kind, handler);
    }
}
