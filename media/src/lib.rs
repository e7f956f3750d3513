//! Peer-to-peer RTP media core.
//!
//! Audio packetization and depacketization with a jitter buffer, per-peer
//! sessions carrying audio and VP8 video, and the transport integration
//! that routes inbound packets to sessions.
//!
//! # Example
//!
//! ```
//! use media::integration::TransportIntegration;
//! use media::session::SessionConfig;
//! use media::testing::RecordingTransport;
//! use media::vp8::{Vp8CodecFactory, DEFAULT_MAX_PAYLOAD_SIZE};
//! use peer_rtp_common::Providers;
//! use std::sync::Arc;
//!
//! let providers = Providers::system();
//! let transport = Arc::new(RecordingTransport::default());
//! let video = Arc::new(Vp8CodecFactory::new(DEFAULT_MAX_PAYLOAD_SIZE, providers.ssrc.clone()));
//!
//! let integration =
//!     TransportIntegration::new(transport.clone(), video, providers, SessionConfig::default(), None);
//! let session = integration
//!     .create_session(42, "127.0.0.1:33445".parse().unwrap())
//!     .unwrap();
//!
//! session.send_audio_packet(&[0u8; 160], 960).unwrap();
//! assert_eq!(transport.sent().len(), 1);
//! ```

pub mod depacketizer;
pub mod integration;
pub mod jitter_buffer;
pub mod packetizer;
pub mod pcm;
pub mod session;
pub mod stats;
pub mod testing;
pub mod video;
pub mod vp8;

pub use depacketizer::AudioDepacketizer;
pub use integration::{AudioReceiveCallback, TransportIntegration, VideoReceiveCallback};
pub use jitter_buffer::{JitterBuffer, JitterBufferConfig, JitterBufferStatus};
pub use packetizer::AudioPacketizer;
pub use session::{AudioConfig, MediaType, Session, SessionConfig};
pub use stats::{ReceiveStats, Statistics};
pub use video::{
    deserialize_video_rtp_packet, serialize_video_rtp_packet, VideoCodec, VideoCodecFactory,
    VideoDepacketizer, VideoPacketizer, VideoRtpPacket, Vp8Descriptor,
};
pub use vp8::{Vp8CodecFactory, Vp8Depacketizer, Vp8Packetizer};
