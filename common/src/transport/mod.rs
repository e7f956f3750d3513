//! Transport substrate interface.
//!
//! The media core does not own sockets or encryption. It hands typed
//! packets to a [`Transport`] and receives inbound packets through handlers
//! registered per [`PacketType`].

mod udp;

pub use udp::UdpTransport;

use std::net::SocketAddr;
use std::sync::Arc;

/// Identifier of a remote peer (friend number).
pub type FriendId = u32;

/// Kind of media carried by a transport packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    // ---
    /// One RTP audio packet
    AudioFrame,

    /// One RTP video fragment
    VideoFrame,
}

impl PacketType {
    // ---
    /// Wire tag prefixed to each datagram by the UDP substrate.
    pub const fn tag(self) -> u8 {
        // ---
        match self {
            PacketType::AudioFrame => 0x21,
            PacketType::VideoFrame => 0x22,
        }
    }

    /// Maps a wire tag back to a packet type.
    pub fn from_tag(tag: u8) -> Option<Self> {
        // ---
        match tag {
            0x21 => Some(PacketType::AudioFrame),
            0x22 => Some(PacketType::VideoFrame),
            _ => None,
        }
    }
}

/// Typed byte blob exchanged with the transport substrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    // ---
    /// Media kind, used to select the inbound handler
    pub kind: PacketType,

    /// Serialized RTP packet
    pub data: Vec<u8>,
}

impl Packet {
    // ---
    pub fn new(kind: PacketType, data: Vec<u8>) -> Self {
        // ---
        Self { kind, data }
    }
}

/// Inbound packet callback: `(packet, source address)`.
pub type PacketHandler = Arc<dyn Fn(&Packet, SocketAddr) -> anyhow::Result<()> + Send + Sync>;

/// Packet send/receive primitives of the underlying transport.
///
/// Implementations may invoke handlers concurrently from their own I/O
/// threads or tasks.
pub trait Transport: Send + Sync {
    /// Sends one packet to `addr`.
    ///
    /// # Errors
    ///
    /// Returns error if the substrate cannot accept the packet.
    fn send(&self, packet: &Packet, addr: SocketAddr) -> anyhow::Result<()>;

    /// Registers the handler for one packet type, replacing any previous one.
    fn register_handler(&self, kind: PacketType, handler: PacketHandler);
}
