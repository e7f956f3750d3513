//! Video RTP wire format and the video codec seam.
//!
//! A video RTP packet is the fixed 12-byte header followed by a VP8 payload
//! descriptor and the codec data. Fragmentation and reassembly live behind
//! the [`VideoPacketizer`] / [`VideoDepacketizer`] traits; this module only
//! moves packets to and from the wire.
//!
//! # VP8 Payload Descriptor
//!
//! ```text
//!       0 1 2 3 4 5 6 7
//!      +-+-+-+-+-+-+-+-+
//!      |X|R|N|S| PartID|  (first byte, always present)
//!      +-+-+-+-+-+-+-+-+
//! X:   |M| PictureID   |  (present when X is set)
//!      +-+-+-+-+-+-+-+-+
//!      |   PictureID   |
//!      +-+-+-+-+-+-+-+-+
//! ```

use peer_rtp_common::{FriendId, Result, RtpHeader};
use std::time::Duration;

/// Extended control bits present
pub const VP8_X_BIT: u8 = 0x80;

/// Non-reference frame
pub const VP8_N_BIT: u8 = 0x20;

/// Start of VP8 partition
pub const VP8_S_BIT: u8 = 0x10;

/// 15-bit picture ID marker in the first extension byte
pub const VP8_M_BIT: u8 = 0x80;

/// RTP clock rate for video
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Parsed VP8 payload descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vp8Descriptor {
    // ---
    /// Frame is not used as a reference by later frames
    pub non_reference: bool,

    /// Packet starts a VP8 partition (first fragment of a frame)
    pub start_of_partition: bool,

    /// 15-bit picture ID; `Some` sets the X bit
    pub picture_id: Option<u16>,
}

impl Vp8Descriptor {
    // ---
    /// Encoded size in bytes (1, or 3 with a picture ID).
    pub fn encoded_len(&self) -> usize {
        // ---
        if self.picture_id.is_some() {
            3
        } else {
            1
        }
    }

    /// Appends the encoded descriptor to `buf`.
    ///
    /// Only the low 15 bits of the picture ID are carried.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        // ---
        let mut flags = 0u8;
        if self.picture_id.is_some() {
            flags |= VP8_X_BIT;
        }
        if self.non_reference {
            flags |= VP8_N_BIT;
        }
        if self.start_of_partition {
            flags |= VP8_S_BIT;
        }
        buf.push(flags);

        if let Some(picture_id) = self.picture_id {
            let id = picture_id & MAX_PICTURE_ID;
            buf.push(VP8_M_BIT | (id >> 8) as u8);
            buf.push((id & 0xFF) as u8);
        }
    }

    /// Parses a descriptor from the front of a video payload.
    ///
    /// Returns the descriptor and its encoded length, or `None` if the
    /// payload is empty or truncated inside the picture ID.
    pub fn parse(payload: &[u8]) -> Option<(Self, usize)> {
        // ---
        let flags = *payload.first()?;

        let picture_id = if flags & VP8_X_BIT != 0 {
            let hi = *payload.get(1)?;
            let lo = *payload.get(2)?;
            Some((((hi & 0x7F) as u16) << 8) | lo as u16)
        } else {
            None
        };

        let descriptor = Self {
            non_reference: flags & VP8_N_BIT != 0,
            start_of_partition: flags & VP8_S_BIT != 0,
            picture_id,
        };
        Some((descriptor, descriptor.encoded_len()))
    }
}

/// Typed video RTP packet exchanged with the video collaborators.
///
/// `payload` holds the VP8 descriptor followed by codec data, exactly as
/// it appears on the wire. `picture_id` is the descriptor's picture ID (0
/// when the X bit is clear).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRtpPacket {
    // ---
    /// Fixed RTP header
    pub header: RtpHeader,

    /// VP8 descriptor + codec bytes
    pub payload: Vec<u8>,

    /// Picture ID parsed from the descriptor
    pub picture_id: u16,
}

impl VideoRtpPacket {
    // ---
    /// Builds a packet, writing `descriptor` in front of `data`.
    pub fn new(header: RtpHeader, descriptor: Vp8Descriptor, data: &[u8]) -> Self {
        // ---
        let mut payload = Vec::with_capacity(descriptor.encoded_len() + data.len());
        descriptor.write_to(&mut payload);
        payload.extend_from_slice(data);

        Self {
            header,
            payload,
            picture_id: descriptor.picture_id.unwrap_or(0),
        }
    }

    /// Descriptor and codec bytes, if the payload carries a descriptor.
    pub fn descriptor(&self) -> Option<(Vp8Descriptor, &[u8])> {
        // ---
        let (descriptor, len) = Vp8Descriptor::parse(&self.payload)?;
        Some((descriptor, &self.payload[len..]))
    }
}

/// Serializes a video packet: header fields packed, payload verbatim.
///
/// # Errors
///
/// Returns error if a header field does not fit its wire width.
pub fn serialize_video_rtp_packet(packet: &VideoRtpPacket) -> Result<Vec<u8>> {
    // ---
    let mut buf = Vec::with_capacity(peer_rtp_common::rtp::RTP_HEADER_LEN + packet.payload.len());
    packet.header.write_to(&mut buf)?;
    buf.extend_from_slice(&packet.payload);
    Ok(buf)
}

/// Deserializes a video packet, extracting the picture ID when X is set.
///
/// # Errors
///
/// Returns error if:
/// - Packet is smaller than the 12-byte header
/// - RTP version is not 2
pub fn deserialize_video_rtp_packet(data: &[u8]) -> Result<VideoRtpPacket> {
    // ---
    let (header, payload) = RtpHeader::parse(data)?;

    let picture_id = Vp8Descriptor::parse(payload)
        .and_then(|(descriptor, _)| descriptor.picture_id)
        .unwrap_or(0);

    Ok(VideoRtpPacket {
        header,
        payload: payload.to_vec(),
        picture_id,
    })
}

/// Video RTP timestamp for a frame captured `elapsed` after session start.
///
/// 90kHz clock: milliseconds × 90, wrapping at 2^32.
pub fn video_timestamp(elapsed: Duration) -> u32 {
    // ---
    (elapsed.as_millis() as u32).wrapping_mul(VIDEO_CLOCK_RATE / 1000)
}

/// Largest picture ID the descriptor can carry (15 bits).
pub const MAX_PICTURE_ID: u16 = 0x7FFF;

/// Picture ID following `current`.
///
/// Wraps within the 15 bits carried on the wire; 0 is reserved so the
/// sequence skips it.
pub fn next_picture_id(current: u16) -> u16 {
    // ---
    match current.wrapping_add(1) & MAX_PICTURE_ID {
        0 => 1,
        next => next,
    }
}

/// Splits encoded frames into video RTP packets.
pub trait VideoPacketizer: Send {
    /// Fragments one encoded frame.
    ///
    /// # Errors
    ///
    /// Returns error if the frame cannot be fragmented.
    fn packetize_frame(
        &mut self,
        frame: &[u8],
        timestamp: u32,
        picture_id: u16,
    ) -> anyhow::Result<Vec<VideoRtpPacket>>;
}

/// Reassembles frames from video RTP packets.
pub trait VideoDepacketizer: Send {
    /// Consumes one packet.
    ///
    /// # Returns
    ///
    /// Tuple of (complete frame or `None` while still assembling, picture ID)
    ///
    /// # Errors
    ///
    /// Returns error if the packet cannot be interpreted.
    fn process_packet(&mut self, packet: VideoRtpPacket) -> anyhow::Result<(Option<Vec<u8>>, u16)>;
}

/// Per-session pair of video collaborators.
pub struct VideoCodec {
    // ---
    pub packetizer: Box<dyn VideoPacketizer>,
    pub depacketizer: Box<dyn VideoDepacketizer>,
}

/// Builds the video collaborators for each new session.
pub trait VideoCodecFactory: Send + Sync {
    /// Creates a fresh packetizer/depacketizer pair for `friend_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the collaborators cannot be constructed.
    fn create(&self, friend_id: FriendId) -> anyhow::Result<VideoCodec>;
}
