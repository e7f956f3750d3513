//! RTP packet structure and serialization.
//!
//! Implements the fixed RTP header according to RFC 3550. CSRC lists and
//! header extensions are not carried; the CSRC count field is passed
//! through verbatim so a packet round-trips unchanged.

use crate::error::{Error, Result};

/// RTP packet version 2 (as per RFC 3550)
pub const RTP_VERSION: u8 = 2;

/// Size of the fixed RTP header in bytes
pub const RTP_HEADER_LEN: usize = 12;

/// Payload type for dynamic audio (Opus) streams
pub const PAYLOAD_TYPE_AUDIO: u8 = 96;

/// Payload type for dynamic VP8 video streams
pub const PAYLOAD_TYPE_VIDEO: u8 = 97;

/// Fixed 12-byte RTP header.
///
/// The version is not stored: serialization always writes 2 and parsing
/// rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    // ---
    /// Padding flag
    pub padding: bool,

    /// Header extension flag
    pub extension: bool,

    /// CSRC count (4 bits)
    pub csrc_count: u8,

    /// Marker bit (last fragment of a video frame)
    pub marker: bool,

    /// Payload type (7 bits)
    pub payload_type: u8,

    /// Packet sequence number (wraps at 65535)
    pub sequence: u16,

    /// RTP timestamp in clock-rate units
    pub timestamp: u32,

    /// Synchronization source identifier
    pub ssrc: u32,
}

impl RtpHeader {
    // ---
    /// Creates a header with all flags cleared.
    pub fn new(payload_type: u8, sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        // ---
        Self {
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type,
            sequence,
            timestamp,
            ssrc,
        }
    }

    /// Appends the 12-byte wire form of this header to `buf`.
    ///
    /// # Wire Format
    ///
    /// ```text
    ///  0                   1                   2                   3
    ///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |                           timestamp                           |
    /// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
    /// |           synchronization source (SSRC) identifier            |
    /// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
    /// ```
    ///
    /// # Errors
    ///
    /// Returns error if the CSRC count exceeds 4 bits or the payload type
    /// exceeds 7 bits.
    pub fn write_to(&self, buf: &mut Vec<u8>) -> Result<()> {
        // ---
        if self.csrc_count > 0x0F {
            return Err(Error::InvalidHeader(format!(
                "CSRC count {} does not fit in 4 bits",
                self.csrc_count
            )));
        }
        if self.payload_type > 0x7F {
            return Err(Error::InvalidHeader(format!(
                "payload type {} does not fit in 7 bits",
                self.payload_type
            )));
        }

        // Byte 0: V(2) | P(1) | X(1) | CC(4)
        let mut b0 = RTP_VERSION << 6;
        if self.padding {
            b0 |= 0x20;
        }
        if self.extension {
            b0 |= 0x10;
        }
        b0 |= self.csrc_count;
        buf.push(b0);

        // Byte 1: M(1) | PT(7)
        let mut b1 = self.payload_type;
        if self.marker {
            b1 |= 0x80;
        }
        buf.push(b1);

        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());

        Ok(())
    }

    /// Parses the fixed header, returning it with the remaining payload.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Packet is smaller than the 12-byte header
    /// - RTP version is not 2
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        // ---
        if data.len() < RTP_HEADER_LEN {
            return Err(Error::PacketTooShort {
                len: data.len(),
                min: RTP_HEADER_LEN,
            });
        }

        let version = (data[0] >> 6) & 0x03;
        if version != RTP_VERSION {
            return Err(Error::InvalidVersion(version));
        }

        let header = Self {
            padding: data[0] & 0x20 != 0,
            extension: data[0] & 0x10 != 0,
            csrc_count: data[0] & 0x0F,
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7F,
            sequence: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        };

        Ok((header, &data[RTP_HEADER_LEN..]))
    }
}

/// RTP packet: fixed header plus opaque payload.
///
/// For audio the payload is the codec frame; for video it begins with the
/// VP8 payload descriptor written by the video packetizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    // ---
    /// Fixed header fields
    pub header: RtpHeader,

    /// Payload bytes following the header
    pub payload: Vec<u8>,
}

impl RtpPacket {
    // ---
    /// Creates an audio RTP packet (payload type 96, no flags).
    ///
    /// # Arguments
    ///
    /// * `sequence` - Packet sequence number
    /// * `timestamp` - RTP timestamp (in sample units)
    /// * `ssrc` - Synchronization source identifier
    /// * `payload` - Encoded audio data
    pub fn new(sequence: u16, timestamp: u32, ssrc: u32, payload: Vec<u8>) -> Self {
        // ---
        Self {
            header: RtpHeader::new(PAYLOAD_TYPE_AUDIO, sequence, timestamp, ssrc),
            payload,
        }
    }

    /// Creates a packet from an explicit header.
    pub fn with_header(header: RtpHeader, payload: Vec<u8>) -> Self {
        // ---
        Self { header, payload }
    }

    /// Serializes the RTP packet into wire format.
    ///
    /// # Errors
    ///
    /// Returns error if a header field does not fit its wire width.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        // ---
        let mut buf = Vec::with_capacity(RTP_HEADER_LEN + self.payload.len());
        self.header.write_to(&mut buf)?;
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Deserializes an RTP packet from wire format.
    ///
    /// Validates the version field but not the payload type, so one parser
    /// serves both media kinds.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Packet is smaller than minimum header size (12 bytes)
    /// - RTP version is not 2
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        // ---
        let (header, payload) = RtpHeader::parse(data)?;
        Ok(Self {
            header,
            payload: payload.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_rtp_packet_serialization() {
        // ---
        let packet = RtpPacket::new(100, 32000, 0x12345678, vec![1, 2, 3, 4]);
        let serialized = packet.serialize().expect("serialization failed");

        assert_eq!(serialized.len(), RTP_HEADER_LEN + 4);
        assert_eq!(serialized[0] >> 6, 2); // Version
        assert_eq!(serialized[1] & 0x7F, 96); // Payload type
        assert_eq!(u16::from_be_bytes([serialized[2], serialized[3]]), 100);
        assert_eq!(&serialized[12..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_rtp_packet_deserialization() {
        // ---
        let packet = RtpPacket::new(200, 64000, 0xAABBCCDD, vec![5, 6, 7, 8]);
        let serialized = packet.serialize().expect("serialization failed");

        let deserialized = RtpPacket::deserialize(&serialized).expect("deserialization failed");

        assert_eq!(deserialized.header.sequence, 200);
        assert_eq!(deserialized.header.timestamp, 64000);
        assert_eq!(deserialized.header.ssrc, 0xAABBCCDD);
        assert_eq!(deserialized.payload, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_flags_survive_wire() {
        // ---
        let mut header = RtpHeader::new(PAYLOAD_TYPE_VIDEO, 7, 90_000, 0xDEADBEEF);
        header.padding = true;
        header.extension = true;
        header.csrc_count = 15;
        header.marker = true;

        let packet = RtpPacket::with_header(header, vec![]);
        let wire = packet.serialize().expect("serialization failed");
        assert_eq!(wire[0], 0x80 | 0x20 | 0x10 | 0x0F);
        assert_eq!(wire[1], 0x80 | PAYLOAD_TYPE_VIDEO);

        let parsed = RtpPacket::deserialize(&wire).expect("deserialization failed");
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_rtp_packet_too_small() {
        // ---
        let data = vec![0x80, 1, 2]; // Only 3 bytes
        let result = RtpPacket::deserialize(&data);

        assert!(matches!(
            result,
            Err(Error::PacketTooShort { len: 3, min: 12 })
        ));
    }

    #[test]
    fn test_rtp_invalid_version() {
        // ---
        let mut data = vec![0; 12];
        data[0] = 1 << 6; // Version 1 instead of 2

        let result = RtpPacket::deserialize(&data);
        assert!(matches!(result, Err(Error::InvalidVersion(1))));
    }

    #[test]
    fn test_out_of_range_fields_rejected() {
        // ---
        let mut header = RtpHeader::new(0x80, 0, 0, 0);
        assert!(RtpPacket::with_header(header, vec![]).serialize().is_err());

        header.payload_type = 96;
        header.csrc_count = 16;
        assert!(RtpPacket::with_header(header, vec![]).serialize().is_err());
    }

    #[test]
    fn test_sequence_wraparound() {
        // ---
        let packet = RtpPacket::new(65535, 0, 0, vec![]);
        let serialized = packet.serialize().expect("serialization failed");
        let deserialized = RtpPacket::deserialize(&serialized).expect("deserialization failed");

        assert_eq!(deserialized.header.sequence, 65535);
        assert!(deserialized.payload.is_empty());
    }
}
