//! Reference VP8 fragmenter and reassembler.
//!
//! Frames are split into payload-size-bounded fragments, each carrying a
//! VP8 descriptor with the picture ID. The first fragment sets the S bit
//! and the last sets the RTP marker. The reassembler follows one picture
//! at a time: a missing fragment or a newer picture drops the frame in
//! progress.

use anyhow::{bail, ensure};
use peer_rtp_common::rtp::PAYLOAD_TYPE_VIDEO;
use peer_rtp_common::{FriendId, RtpHeader, SsrcProvider};
use std::sync::Arc;
use tracing::debug;

use crate::video::{
    VideoCodec, VideoCodecFactory, VideoDepacketizer, VideoPacketizer, VideoRtpPacket,
    Vp8Descriptor,
};

/// Default maximum RTP payload per fragment (fits a 1500-byte MTU)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1200;

/// Frames larger than this are dropped during reassembly
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// Descriptor size with a picture ID
const DESCRIPTOR_LEN: usize = 3;

/// Splits VP8 frames into RTP fragments for one outbound video stream.
pub struct Vp8Packetizer {
    // ---
    ssrc: u32,
    sequence: u16,
    max_payload_size: usize,
}

impl Vp8Packetizer {
    // ---
    /// Creates a packetizer with its own SSRC.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `max_payload_size` leaves no room after the descriptor
    /// - The SSRC provider fails
    pub fn new(max_payload_size: usize, ssrc_provider: &dyn SsrcProvider) -> anyhow::Result<Self> {
        // ---
        ensure!(
            max_payload_size > DESCRIPTOR_LEN,
            "max payload size {} leaves no room for VP8 data",
            max_payload_size
        );

        Ok(Self {
            ssrc: ssrc_provider.generate_ssrc()?,
            sequence: 0,
            max_payload_size,
        })
    }

    /// Stream SSRC.
    pub fn ssrc(&self) -> u32 {
        // ---
        self.ssrc
    }
}

impl VideoPacketizer for Vp8Packetizer {
    fn packetize_frame(
        &mut self,
        frame: &[u8],
        timestamp: u32,
        picture_id: u16,
    ) -> anyhow::Result<Vec<VideoRtpPacket>> {
        // ---
        ensure!(!frame.is_empty(), "empty VP8 frame");

        let chunk_size = self.max_payload_size - DESCRIPTOR_LEN;
        let fragment_count = frame.len().div_ceil(chunk_size);

        let packets = frame
            .chunks(chunk_size)
            .enumerate()
            .map(|(index, chunk)| {
                let mut header =
                    RtpHeader::new(PAYLOAD_TYPE_VIDEO, self.sequence, timestamp, self.ssrc);
                header.marker = index + 1 == fragment_count;
                self.sequence = self.sequence.wrapping_add(1);

                let descriptor = Vp8Descriptor {
                    non_reference: false,
                    start_of_partition: index == 0,
                    picture_id: Some(picture_id),
                };
                VideoRtpPacket::new(header, descriptor, chunk)
            })
            .collect();

        Ok(packets)
    }
}

/// Frame being reassembled.
struct PartialFrame {
    picture_id: u16,
    next_sequence: u16,
    data: Vec<u8>,
}

/// Reassembles VP8 frames for one inbound video stream.
#[derive(Default)]
pub struct Vp8Depacketizer {
    // ---
    current: Option<PartialFrame>,
    frames_dropped: u64,
}

impl Vp8Depacketizer {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Frames abandoned because a fragment went missing.
    pub fn frames_dropped(&self) -> u64 {
        // ---
        self.frames_dropped
    }

    fn drop_current(&mut self, reason: &str) {
        // ---
        if let Some(partial) = self.current.take() {
            self.frames_dropped += 1;
            debug!(
                "Dropping incomplete VP8 frame picture_id={} ({})",
                partial.picture_id, reason
            );
        }
    }
}

impl VideoDepacketizer for Vp8Depacketizer {
    fn process_packet(&mut self, packet: VideoRtpPacket) -> anyhow::Result<(Option<Vec<u8>>, u16)> {
        // ---
        let picture_id = packet.picture_id;
        let Some((descriptor, data)) = packet.descriptor() else {
            bail!("missing VP8 payload descriptor");
        };
        let sequence = packet.header.sequence;

        if descriptor.start_of_partition {
            self.drop_current("superseded by a new frame");
            self.current = Some(PartialFrame {
                picture_id,
                next_sequence: sequence,
                data: Vec::new(),
            });
        }

        let Some(partial) = self.current.as_mut() else {
            // Continuation without a start fragment
            return Ok((None, picture_id));
        };

        if partial.picture_id != picture_id || partial.next_sequence != sequence {
            self.drop_current("missing fragment");
            return Ok((None, picture_id));
        }

        if partial.data.len() + data.len() > MAX_FRAME_SIZE {
            self.drop_current("frame too large");
            bail!("VP8 frame exceeds {} bytes", MAX_FRAME_SIZE);
        }

        partial.data.extend_from_slice(data);
        partial.next_sequence = sequence.wrapping_add(1);

        if packet.header.marker {
            let frame = self.current.take().map(|partial| partial.data);
            return Ok((frame, picture_id));
        }

        Ok((None, picture_id))
    }
}

/// Factory handing each session a fresh VP8 packetizer/depacketizer pair.
pub struct Vp8CodecFactory {
    // ---
    max_payload_size: usize,
    ssrc_provider: Arc<dyn SsrcProvider>,
}

impl Vp8CodecFactory {
    // ---
    pub fn new(max_payload_size: usize, ssrc_provider: Arc<dyn SsrcProvider>) -> Self {
        // ---
        Self {
            max_payload_size,
            ssrc_provider,
        }
    }
}

impl VideoCodecFactory for Vp8CodecFactory {
    fn create(&self, friend_id: FriendId) -> anyhow::Result<VideoCodec> {
        // ---
        let packetizer = Vp8Packetizer::new(self.max_payload_size, self.ssrc_provider.as_ref())?;
        debug!(
            "VP8 packetizer for friend {} using SSRC 0x{:08X}",
            friend_id,
            packetizer.ssrc()
        );

        Ok(VideoCodec {
            packetizer: Box::new(packetizer),
            depacketizer: Box::new(Vp8Depacketizer::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::testing::FixedSsrc;

    fn packetizer(max_payload_size: usize) -> Vp8Packetizer {
        Vp8Packetizer::new(max_payload_size, &FixedSsrc(0x5150)).expect("packetizer")
    }

    #[test]
    fn test_fragmentation_flags() {
        // ---
        let mut packetizer = packetizer(13); // 10 data bytes per fragment
        let frame: Vec<u8> = (0..25).collect();

        let packets = packetizer
            .packetize_frame(&frame, 9000, 7)
            .expect("packetize failed");
        assert_eq!(packets.len(), 3);

        for (i, packet) in packets.iter().enumerate() {
            let (descriptor, data) = packet.descriptor().expect("descriptor");
            assert_eq!(descriptor.start_of_partition, i == 0);
            assert_eq!(descriptor.picture_id, Some(7));
            assert_eq!(packet.header.marker, i == 2);
            assert_eq!(packet.header.sequence, i as u16);
            assert_eq!(packet.header.timestamp, 9000);
            assert_eq!(packet.header.ssrc, 0x5150);
            assert!(packet.payload.len() <= 13);
            assert_eq!(data.len(), if i == 2 { 5 } else { 10 });
        }
    }

    #[test]
    fn test_tiny_payload_size_rejected() {
        // ---
        assert!(Vp8Packetizer::new(3, &FixedSsrc(1)).is_err());
    }

    #[test]
    fn test_reassembly_round_trip() {
        // ---
        let mut packetizer = packetizer(100);
        let mut depacketizer = Vp8Depacketizer::new();
        let frame: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();

        let packets = packetizer.packetize_frame(&frame, 0, 42).expect("packetize");
        let last = packets.len() - 1;

        for (i, packet) in packets.into_iter().enumerate() {
            let (assembled, picture_id) = depacketizer.process_packet(packet).expect("process");
            assert_eq!(picture_id, 42);
            if i == last {
                assert_eq!(assembled, Some(frame.clone()));
            } else {
                assert_eq!(assembled, None);
            }
        }
    }

    #[test]
    fn test_missing_fragment_drops_frame() {
        // ---
        let mut packetizer = packetizer(13);
        let mut depacketizer = Vp8Depacketizer::new();

        let mut packets = packetizer.packetize_frame(&[1u8; 30], 0, 1).expect("packetize");
        packets.remove(1);

        for packet in packets {
            let (assembled, _) = depacketizer.process_packet(packet).expect("process");
            assert_eq!(assembled, None);
        }
        assert_eq!(depacketizer.frames_dropped(), 1);

        // Next frame still assembles
        let next = packetizer.packetize_frame(&[2u8; 5], 3000, 2).expect("packetize");
        let (assembled, picture_id) = depacketizer
            .process_packet(next.into_iter().next().expect("one fragment"))
            .expect("process");
        assert_eq!(assembled, Some(vec![2u8; 5]));
        assert_eq!(picture_id, 2);
    }

    #[test]
    fn test_newer_frame_supersedes_partial() {
        // ---
        let mut packetizer = packetizer(13);
        let mut depacketizer = Vp8Depacketizer::new();

        let first = packetizer.packetize_frame(&[1u8; 20], 0, 1).expect("packetize");
        let second = packetizer.packetize_frame(&[2u8; 4], 3000, 2).expect("packetize");

        depacketizer
            .process_packet(first[0].clone())
            .expect("process");
        let (assembled, picture_id) = depacketizer
            .process_packet(second[0].clone())
            .expect("process");

        assert_eq!(assembled, Some(vec![2u8; 4]));
        assert_eq!(picture_id, 2);
        assert_eq!(depacketizer.frames_dropped(), 1);
    }

    #[test]
    fn test_missing_descriptor_is_error() {
        // ---
        let mut depacketizer = Vp8Depacketizer::new();
        let packet = VideoRtpPacket {
            header: RtpHeader::new(PAYLOAD_TYPE_VIDEO, 0, 0, 1),
            payload: Vec::new(),
            picture_id: 0,
        };
        assert!(depacketizer.process_packet(packet).is_err());
    }

    #[test]
    fn test_empty_frame_rejected() {
        // ---
        let mut packetizer = packetizer(100);
        assert!(packetizer.packetize_frame(&[], 0, 1).is_err());
    }
}
