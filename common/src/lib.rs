//! Common RTP utilities shared by the media, sender and receiver crates.
//!
//! This crate provides the RTP wire format, the error taxonomy, the
//! capability traits injected into the media core (time, SSRC, transport),
//! and the observability/CLI policy shared by both binaries.

pub mod cli;
pub mod error;
pub mod observability;
pub mod providers;
pub mod rtp;
pub mod transport;

pub use cli::ColorWhen;
pub use error::{BoxError, Error, Result};
pub use observability::{init_tracing, MetricsContext, MetricsServerConfig};
pub use providers::{
    ManualClock, Providers, RandomSsrcProvider, SsrcProvider, SystemTimeProvider, TimeProvider,
};
pub use rtp::{RtpHeader, RtpPacket};
pub use transport::{FriendId, Packet, PacketHandler, PacketType, Transport, UdpTransport};
