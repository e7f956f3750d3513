//! Statistics tracking for sessions and inbound streams.
//!
//! [`Statistics`] is the per-session traffic record returned by value to
//! any reader. [`ReceiveStats`] tracks loss and reordering for one inbound
//! audio stream from its sequence numbers.

use std::time::{Duration, Instant};
use tracing::info;

/// Per-session traffic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    // ---
    /// RTP packets handed to the transport (audio and video fragments)
    pub packets_sent: u64,

    /// RTP packets accepted from the peer
    pub packets_received: u64,

    /// Serialized bytes handed to the transport
    pub bytes_sent: u64,

    /// Serialized bytes accepted from the peer
    pub bytes_received: u64,

    /// Session creation instant
    pub start_time: Instant,
}

impl Statistics {
    // ---
    /// Empty counters starting at `start_time`.
    pub fn new(start_time: Instant) -> Self {
        // ---
        Self {
            packets_sent: 0,
            packets_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            start_time,
        }
    }

    /// Session age at `now`.
    pub fn runtime(&self, now: Instant) -> Duration {
        // ---
        now.saturating_duration_since(self.start_time)
    }

    /// Average outbound packet rate up to `now`.
    pub fn packets_per_second_sent(&self, now: Instant) -> f64 {
        // ---
        let elapsed = self.runtime(now).as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.packets_sent as f64 / elapsed
        }
    }
}

/// Loss and reordering statistics for one inbound RTP stream.
///
/// Loss is inferred from forward sequence-number gaps; a packet behind the
/// highest sequence seen counts as reordered rather than lost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    // ---
    /// Total packets received successfully
    pub packets_received: u64,

    /// Total packets lost (detected via sequence gaps)
    pub packets_lost: u64,

    /// Total packets that arrived behind the highest sequence seen
    pub packets_reordered: u64,

    /// Number of discontinuities observed
    pub sequence_gaps: u64,

    /// Packets rejected for carrying a foreign SSRC
    pub ssrc_mismatches: u64,

    /// Highest sequence number seen
    highest_sequence: Option<u16>,
}

/// Outcome of recording one sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    // ---
    /// First packet or the expected next one
    InOrder,

    /// Forward jump; `lost` packets were skipped
    Gap { expected: u16, lost: u16 },

    /// Packet at or behind the highest sequence seen
    Reordered,
}

impl ReceiveStats {
    // ---
    /// Records a received packet and classifies its sequence number.
    ///
    /// # Arguments
    ///
    /// * `sequence` - Sequence number of received packet
    pub fn record_packet(&mut self, sequence: u16) -> SequenceEvent {
        // ---
        self.packets_received += 1;

        let Some(highest) = self.highest_sequence else {
            self.highest_sequence = Some(sequence);
            return SequenceEvent::InOrder;
        };

        let expected = highest.wrapping_add(1);
        let distance = sequence.wrapping_sub(expected);

        if distance == 0 {
            self.highest_sequence = Some(sequence);
            SequenceEvent::InOrder
        } else if distance < 32768 {
            // Forward jump (accounting for wraparound)
            self.highest_sequence = Some(sequence);
            self.packets_lost += distance as u64;
            self.sequence_gaps += 1;
            SequenceEvent::Gap {
                expected,
                lost: distance,
            }
        } else {
            self.packets_reordered += 1;
            SequenceEvent::Reordered
        }
    }

    /// Records a packet rejected for a foreign SSRC.
    pub fn record_ssrc_mismatch(&mut self) {
        // ---
        self.ssrc_mismatches += 1;
    }

    /// Calculates current packet loss percentage.
    pub fn loss_percentage(&self) -> f64 {
        // ---
        let total = self.packets_received + self.packets_lost;
        if total == 0 {
            0.0
        } else {
            (self.packets_lost as f64 / total as f64) * 100.0
        }
    }

    /// Calculates reorder percentage.
    pub fn reorder_percentage(&self) -> f64 {
        // ---
        if self.packets_received == 0 {
            0.0
        } else {
            (self.packets_reordered as f64 / self.packets_received as f64) * 100.0
        }
    }

    /// Logs current statistics at info level.
    pub fn log(&self, peer: impl std::fmt::Display) {
        // ---
        info!(
            "RX Stats [{}]: {} pkts, {:.2}% loss, {:.2}% reordered, {} SSRC mismatches",
            peer,
            self.packets_received,
            self.loss_percentage(),
            self.reorder_percentage(),
            self.ssrc_mismatches
        );
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_stats_no_loss() {
        // ---
        let mut stats = ReceiveStats::default();

        assert_eq!(stats.record_packet(0), SequenceEvent::InOrder);
        assert_eq!(stats.record_packet(1), SequenceEvent::InOrder);
        assert_eq!(stats.record_packet(2), SequenceEvent::InOrder);

        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_lost, 0);
        assert_eq!(stats.loss_percentage(), 0.0);
    }

    #[test]
    fn test_stats_with_loss() {
        // ---
        let mut stats = ReceiveStats::default();

        stats.record_packet(0);
        stats.record_packet(1);
        let event = stats.record_packet(5); // Gap: lost 2, 3, 4

        assert_eq!(
            event,
            SequenceEvent::Gap {
                expected: 2,
                lost: 3
            }
        );
        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_lost, 3);
        assert_eq!(stats.sequence_gaps, 1);
        assert_eq!(stats.loss_percentage(), 50.0); // 3 lost out of 6 total
    }

    #[test]
    fn test_stats_with_reordering() {
        // ---
        let mut stats = ReceiveStats::default();

        stats.record_packet(0);
        stats.record_packet(2);
        assert_eq!(stats.record_packet(1), SequenceEvent::Reordered);

        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_reordered, 1);

        let expected = 100.0 / 3.0;
        let actual = stats.reorder_percentage();
        assert!(
            (actual - expected).abs() < 0.001,
            "Expected ~{}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_sequence_wraparound() {
        // ---
        let mut stats = ReceiveStats::default();

        stats.record_packet(65534);
        stats.record_packet(65535);
        assert_eq!(stats.record_packet(0), SequenceEvent::InOrder);

        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_lost, 0);
    }

    #[test]
    fn test_session_statistics_rate() {
        // ---
        let start = Instant::now();
        let mut stats = Statistics::new(start);
        stats.packets_sent = 100;

        assert_eq!(stats.packets_per_second_sent(start), 0.0);
        let rate = stats.packets_per_second_sent(start + Duration::from_secs(2));
        assert!((rate - 50.0).abs() < f64::EPSILON);
    }
}
