//! Audio RTP packetization.
//!
//! Turns encoded audio frames into RTP packets and hands them to the
//! transport substrate. Sequence number and timestamp only advance once the
//! transport has accepted a packet, so a failed send can be retried with
//! the same pair.

use parking_lot::Mutex;
use peer_rtp_common::rtp::PAYLOAD_TYPE_AUDIO;
use peer_rtp_common::{Error, Packet, PacketType, Result, RtpPacket, SsrcProvider, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error};

/// Default audio clock rate (Opus always runs its RTP clock at 48kHz)
pub const DEFAULT_AUDIO_CLOCK_RATE: u32 = 48_000;

/// Mutable counters guarded by the packetizer lock.
#[derive(Debug, Clone, Copy)]
struct Counters {
    sequence: u16,
    timestamp: u32,
    packets_sent: u64,
}

/// RTP packetizer for one outbound audio stream.
///
/// The SSRC is drawn once at construction and never changes. Sends are
/// serialized by an internal lock, so concurrent callers still observe a
/// strictly monotonic sequence.
///
/// # Protocol Details
///
/// - Version: Always 2 (RFC 3550)
/// - Payload Type: 96 (dynamic assignment)
/// - Sequence: Increments by 1 per accepted packet, wrapping at 65535
/// - Timestamp: Increments by the sample count per accepted packet
pub struct AudioPacketizer {
    // ---
    ssrc: u32,
    clock_rate: u32,
    remote_addr: SocketAddr,
    transport: Arc<dyn Transport>,
    counters: Mutex<Counters>,
}

impl AudioPacketizer {
    // ---
    /// Creates a packetizer sending to `remote_addr`.
    ///
    /// # Arguments
    ///
    /// * `clock_rate` - RTP clock rate in Hz (must be non-zero)
    /// * `transport` - Substrate the packets are handed to
    /// * `remote_addr` - Destination peer address
    /// * `ssrc_provider` - Source of the stream's SSRC
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `clock_rate` is zero
    /// - The SSRC provider fails
    pub fn new(
        clock_rate: u32,
        transport: Arc<dyn Transport>,
        remote_addr: SocketAddr,
        ssrc_provider: &dyn SsrcProvider,
    ) -> Result<Self> {
        // ---
        if clock_rate == 0 {
            return Err(Error::InvalidClockRate(clock_rate));
        }

        let ssrc = ssrc_provider
            .generate_ssrc()
            .map_err(|e| Error::SsrcGeneration(e.into()))?;

        debug!(
            "Audio packetizer for {} using SSRC 0x{:08X} @ {}Hz",
            remote_addr, ssrc, clock_rate
        );

        Ok(Self {
            ssrc,
            clock_rate,
            remote_addr,
            transport,
            counters: Mutex::new(Counters {
                sequence: 0,
                timestamp: 0,
                packets_sent: 0,
            }),
        })
    }

    /// Overrides the next sequence number and timestamp.
    pub fn starting_at(self, sequence: u16, timestamp: u32) -> Self {
        // ---
        {
            let mut counters = self.counters.lock();
            counters.sequence = sequence;
            counters.timestamp = timestamp;
        }
        self
    }

    /// Packetizes one encoded frame and sends it.
    ///
    /// # Arguments
    ///
    /// * `data` - Encoded audio frame
    /// * `sample_count` - Samples (per channel) the frame covers
    ///
    /// # Returns
    ///
    /// Size of the serialized RTP packet in bytes.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `data` is empty
    /// - Serialization fails
    /// - The transport rejects the packet (counters are left unchanged)
    pub fn packetize_and_send(&self, data: &[u8], sample_count: u32) -> Result<usize> {
        // ---
        if data.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let mut counters = self.counters.lock();

        let packet = RtpPacket::new(counters.sequence, counters.timestamp, self.ssrc, data.to_vec());
        let wire = packet.serialize()?;
        let wire_len = wire.len();

        if let Err(e) = self.transport.send(
            &Packet::new(PacketType::AudioFrame, wire),
            self.remote_addr,
        ) {
            error!(
                "Failed to send audio packet seq={} to {}: {:#}",
                counters.sequence, self.remote_addr, e
            );
            return Err(Error::transport(
                format!("failed to send audio packet seq={}", counters.sequence),
                e,
            ));
        }

        counters.sequence = counters.sequence.wrapping_add(1);
        counters.timestamp = counters.timestamp.wrapping_add(sample_count);
        counters.packets_sent += 1;

        if counters.packets_sent % 100 == 0 {
            debug!(
                "Sent {} audio packets to {} - next seq={}",
                counters.packets_sent, self.remote_addr, counters.sequence
            );
        }

        Ok(wire_len)
    }

    /// Stream SSRC.
    pub fn ssrc(&self) -> u32 {
        // ---
        self.ssrc
    }

    /// RTP clock rate in Hz.
    pub fn clock_rate(&self) -> u32 {
        // ---
        self.clock_rate
    }

    /// Payload type written into every packet.
    pub fn payload_type(&self) -> u8 {
        // ---
        PAYLOAD_TYPE_AUDIO
    }

    /// Sequence number the next packet will carry.
    pub fn next_sequence(&self) -> u16 {
        // ---
        self.counters.lock().sequence
    }

    /// Timestamp the next packet will carry.
    pub fn next_timestamp(&self) -> u32 {
        // ---
        self.counters.lock().timestamp
    }
}
