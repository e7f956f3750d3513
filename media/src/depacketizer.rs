//! Audio RTP depacketization.
//!
//! Parses inbound audio RTP packets, binds to the first SSRC seen, and
//! feeds payloads into a jitter buffer for smoothed playout.

use parking_lot::Mutex;
use peer_rtp_common::{Error, Result, RtpPacket, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::jitter_buffer::{JitterBuffer, JitterBufferConfig, JitterBufferStatus};
use crate::stats::{ReceiveStats, SequenceEvent};

/// State guarded by the depacketizer lock.
struct DepacketizerState {
    bound_ssrc: Option<u32>,
    jitter_buffer: JitterBuffer,
    stats: ReceiveStats,
}

/// Depacketizer for one inbound audio stream.
///
/// The first packet binds the stream SSRC for the lifetime of the
/// depacketizer. A later packet with another SSRC is a protocol violation
/// (a crossed or spoofed stream), not a stream switch, and is rejected.
/// Sequence gaps are expected on an unreliable substrate: they are logged
/// and counted but never rejected.
pub struct AudioDepacketizer {
    // ---
    state: Mutex<DepacketizerState>,
}

impl AudioDepacketizer {
    // ---
    /// Creates an unbound depacketizer with its own jitter buffer.
    pub fn new(config: JitterBufferConfig, clock: Arc<dyn TimeProvider>) -> Self {
        // ---
        Self {
            state: Mutex::new(DepacketizerState {
                bound_ssrc: None,
                jitter_buffer: JitterBuffer::new(config, clock),
                stats: ReceiveStats::default(),
            }),
        }
    }

    /// Processes one serialized RTP packet.
    ///
    /// On success the payload is buffered under its RTP timestamp and also
    /// returned for immediate use.
    ///
    /// # Returns
    ///
    /// Tuple of (payload, RTP timestamp)
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `data` is empty
    /// - The RTP header is malformed
    /// - The SSRC differs from the bound SSRC (state is left unchanged)
    pub fn process_packet(&self, data: &[u8]) -> Result<(Vec<u8>, u32)> {
        // ---
        if data.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let packet = RtpPacket::deserialize(data)?;
        let header = packet.header;

        let mut state = self.state.lock();

        match state.bound_ssrc {
            None => {
                info!("Audio stream bound to SSRC 0x{:08X}", header.ssrc);
                state.bound_ssrc = Some(header.ssrc);
            }
            Some(bound) if bound != header.ssrc => {
                state.stats.record_ssrc_mismatch();
                warn!(
                    "Rejecting audio packet seq={} from SSRC 0x{:08X} (bound to 0x{:08X})",
                    header.sequence, header.ssrc, bound
                );
                return Err(Error::SsrcMismatch {
                    expected: bound,
                    actual: header.ssrc,
                });
            }
            Some(_) => {}
        }

        match state.stats.record_packet(header.sequence) {
            SequenceEvent::InOrder => {}
            SequenceEvent::Gap { expected, lost } => {
                warn!(
                    "Sequence gap: expected seq={}, got seq={} ({} packets lost)",
                    expected, header.sequence, lost
                );
            }
            SequenceEvent::Reordered => {
                debug!("Late/reordered audio packet seq={}", header.sequence);
            }
        }

        state
            .jitter_buffer
            .add(header.timestamp, packet.payload.clone());

        Ok((packet.payload, header.timestamp))
    }

    /// Pulls the next payload from the jitter buffer, if one is due.
    pub fn get_buffered_audio(&self) -> Option<Vec<u8>> {
        // ---
        self.state.lock().jitter_buffer.get()
    }

    /// SSRC the stream is bound to, once a packet has been accepted.
    pub fn bound_ssrc(&self) -> Option<u32> {
        // ---
        self.state.lock().bound_ssrc
    }

    /// Copy of the loss/reordering counters.
    pub fn stats(&self) -> ReceiveStats {
        // ---
        self.state.lock().stats
    }

    /// Jitter buffer status snapshot.
    pub fn buffer_status(&self) -> JitterBufferStatus {
        // ---
        self.state.lock().jitter_buffer.status()
    }

    /// Discards buffered audio and re-arms the release gate.
    pub fn reset_buffer(&self) {
        // ---
        self.state.lock().jitter_buffer.reset();
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use peer_rtp_common::ManualClock;
    use std::time::Duration;

    fn depacketizer() -> (AudioDepacketizer, Arc<ManualClock>) {
        // ---
        let clock = Arc::new(ManualClock::new());
        let config = JitterBufferConfig {
            buffer_time: Duration::from_millis(20),
            max_capacity: 10,
        };
        (AudioDepacketizer::new(config, clock.clone()), clock)
    }

    fn wire(seq: u16, ts: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
        RtpPacket::new(seq, ts, ssrc, payload.to_vec())
            .serialize()
            .expect("serialization failed")
    }

    #[test]
    fn test_empty_input_rejected() {
        // ---
        let (depacketizer, _) = depacketizer();
        assert!(matches!(
            depacketizer.process_packet(&[]),
            Err(Error::EmptyPayload)
        ));
    }

    #[test]
    fn test_malformed_header_rejected() {
        // ---
        let (depacketizer, _) = depacketizer();
        assert!(matches!(
            depacketizer.process_packet(&[0x80, 96, 0]),
            Err(Error::PacketTooShort { .. })
        ));
        assert_eq!(depacketizer.bound_ssrc(), None);
    }

    #[test]
    fn test_returns_payload_and_timestamp() {
        // ---
        let (depacketizer, _) = depacketizer();
        let (payload, ts) = depacketizer
            .process_packet(&wire(0, 960, 0xAB, &[1, 2, 3]))
            .expect("processing failed");

        assert_eq!(payload, vec![1, 2, 3]);
        assert_eq!(ts, 960);
        assert_eq!(depacketizer.bound_ssrc(), Some(0xAB));
    }

    #[test]
    fn test_ssrc_mismatch_leaves_state_untouched() {
        // ---
        let (depacketizer, _) = depacketizer();
        depacketizer
            .process_packet(&wire(0, 0, 0x1111, &[1]))
            .expect("first packet binds");

        let result = depacketizer.process_packet(&wire(1, 960, 0x2222, &[2]));
        assert!(matches!(
            result,
            Err(Error::SsrcMismatch {
                expected: 0x1111,
                actual: 0x2222
            })
        ));

        assert_eq!(depacketizer.bound_ssrc(), Some(0x1111));
        assert_eq!(depacketizer.buffer_status().buffered_packets, 1);
        let stats = depacketizer.stats();
        assert_eq!(stats.packets_received, 1);
        assert_eq!(stats.ssrc_mismatches, 1);
    }

    #[test]
    fn test_sequence_gap_is_not_fatal() {
        // ---
        let (depacketizer, _) = depacketizer();
        depacketizer.process_packet(&wire(10, 0, 7, &[1])).expect("ok");
        depacketizer
            .process_packet(&wire(15, 4800, 7, &[2]))
            .expect("gap must be tolerated");

        let stats = depacketizer.stats();
        assert_eq!(stats.packets_lost, 4);
        assert_eq!(stats.sequence_gaps, 1);
    }

    #[test]
    fn test_buffered_audio_in_timestamp_order() {
        // ---
        let (depacketizer, clock) = depacketizer();
        depacketizer.process_packet(&wire(1, 960, 7, b"second")).expect("ok");
        depacketizer.process_packet(&wire(0, 0, 7, b"first")).expect("ok");

        assert_eq!(depacketizer.get_buffered_audio(), None);
        clock.advance(Duration::from_millis(20));
        assert_eq!(depacketizer.get_buffered_audio(), Some(b"first".to_vec()));
        clock.advance(Duration::from_millis(20));
        assert_eq!(depacketizer.get_buffered_audio(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_reset_buffer_keeps_stream_binding() {
        // ---
        let (depacketizer, clock) = depacketizer();
        depacketizer.process_packet(&wire(0, 0, 7, &[1])).expect("ok");
        depacketizer.process_packet(&wire(1, 960, 7, &[2])).expect("ok");

        depacketizer.reset_buffer();
        assert_eq!(depacketizer.buffer_status().buffered_packets, 0);
        assert_eq!(depacketizer.bound_ssrc(), Some(7));

        clock.advance(Duration::from_millis(20));
        assert_eq!(depacketizer.get_buffered_audio(), None);
    }
}
