//! Peer RTP sender library.
//!
//! Streams a WAV clip (and optionally a synthetic video feed) to one peer
//! through a media session. Pacing is real time; the session does the
//! RTP work.

pub mod audio;

pub use audio::{read_wav, AudioClip, SAMPLES_PER_FRAME, SAMPLE_RATE};

use anyhow::{Context, Result};
use media::pcm::samples_to_le_bytes;
use media::Session;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Streams `clip` as 20ms PCM frames.
///
/// # Arguments
///
/// * `clip` - 48kHz mono audio
/// * `session` - Session with the receiving peer
/// * `frame_interval` - Pacing between frames
/// * `loop_audio` - Replay the clip until the task is cancelled
///
/// # Returns
///
/// Number of frames sent.
///
/// # Errors
///
/// Returns error if a frame cannot be sent (session closed, transport
/// failure).
pub async fn stream_audio(
    clip: &AudioClip,
    session: &Session,
    frame_interval: Duration,
    loop_audio: bool,
) -> Result<u64> {
    // ---
    let mut ticker = interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames_sent = 0u64;

    loop {
        for frame in clip.frames() {
            ticker.tick().await;

            let payload = samples_to_le_bytes(&frame);
            session
                .send_audio_packet(&payload, frame.len() as u32)
                .with_context(|| format!("failed to send audio frame {}", frames_sent))?;
            frames_sent += 1;

            if frames_sent % 250 == 0 {
                info!("Sent {} audio frames to friend {}", frames_sent, session.friend_id());
            }
        }

        if !loop_audio {
            break;
        }
        debug!("Looping audio clip");
    }

    info!("Streamed {} audio frames", frames_sent);
    Ok(frames_sent)
}

/// Synthetic video source producing fixed-size patterned frames.
#[derive(Debug, Clone)]
pub struct TestPattern {
    // ---
    frame_size: usize,
    frame_index: u32,
}

impl TestPattern {
    // ---
    pub fn new(frame_size: usize) -> Self {
        // ---
        Self {
            frame_size: frame_size.max(1),
            frame_index: 0,
        }
    }

    /// Next frame; bytes shift by one value per frame.
    pub fn next_frame(&mut self) -> Vec<u8> {
        // ---
        let offset = self.frame_index;
        self.frame_index = self.frame_index.wrapping_add(1);
        (0..self.frame_size)
            .map(|i| (i as u32).wrapping_add(offset) as u8)
            .collect()
    }
}

/// Streams `frame_count` synthetic video frames at `fps`.
///
/// # Errors
///
/// Returns error if `fps` is zero or a frame cannot be sent.
pub async fn stream_video(
    pattern: &mut TestPattern,
    session: &Session,
    fps: u32,
    frame_count: Option<u64>,
) -> Result<u64> {
    // ---
    anyhow::ensure!(fps > 0, "video frame rate must be positive");

    let mut ticker = interval(Duration::from_secs(1) / fps);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut frames_sent = 0u64;

    while frame_count.map_or(true, |limit| frames_sent < limit) {
        ticker.tick().await;
        let frame = pattern.next_frame();
        session
            .send_video_packet(&frame)
            .with_context(|| format!("failed to send video frame {}", frames_sent))?;
        frames_sent += 1;
    }

    info!("Streamed {} video frames", frames_sent);
    Ok(frames_sent)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use media::testing::{FixedSsrc, RecordingTransport};
    use media::{SessionConfig, Vp8CodecFactory, VideoCodecFactory};
    use peer_rtp_common::{PacketType, Providers, RtpPacket, SystemTimeProvider};
    use std::sync::Arc;

    fn session(transport: Arc<RecordingTransport>) -> Session {
        // ---
        let providers = Providers::new(Arc::new(SystemTimeProvider), Arc::new(FixedSsrc(9)));
        let video = Vp8CodecFactory::new(500, providers.ssrc.clone())
            .create(1)
            .expect("video codec");
        Session::new(
            1,
            "127.0.0.1:5004".parse().expect("addr"),
            transport,
            video,
            &providers,
            &SessionConfig::default(),
        )
        .expect("session")
    }

    #[tokio::test]
    async fn test_stream_audio_once() {
        // ---
        let transport = Arc::new(RecordingTransport::default());
        let session = session(transport.clone());
        let clip = AudioClip {
            samples: vec![1; SAMPLES_PER_FRAME * 2 + 1],
            source_rate: SAMPLE_RATE,
            source_channels: 1,
        };

        let sent = stream_audio(&clip, &session, Duration::from_millis(1), false)
            .await
            .expect("stream failed");
        assert_eq!(sent, 3);

        let packets = transport.sent();
        assert_eq!(packets.len(), 3);
        let last = RtpPacket::deserialize(&packets[2].0.data).expect("valid RTP");
        assert_eq!(last.header.timestamp, 2 * SAMPLES_PER_FRAME as u32);
        assert_eq!(last.payload.len(), SAMPLES_PER_FRAME * 2);
    }

    #[tokio::test]
    async fn test_stream_audio_stops_on_closed_session() {
        // ---
        let transport = Arc::new(RecordingTransport::default());
        let session = session(transport);
        session.close().expect("close");

        let clip = AudioClip {
            samples: vec![0; SAMPLES_PER_FRAME],
            source_rate: SAMPLE_RATE,
            source_channels: 1,
        };
        assert!(stream_audio(&clip, &session, Duration::from_millis(1), true)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stream_video_frames() {
        // ---
        let transport = Arc::new(RecordingTransport::default());
        let session = session(transport.clone());
        let mut pattern = TestPattern::new(1200);

        let sent = stream_video(&mut pattern, &session, 1000, Some(2))
            .await
            .expect("stream failed");
        assert_eq!(sent, 2);

        // 1200 bytes in 497-byte chunks: three fragments per frame
        let packets = transport.sent();
        assert_eq!(packets.len(), 6);
        assert!(packets.iter().all(|(p, _)| p.kind == PacketType::VideoFrame));
    }

    #[test]
    fn test_pattern_changes_per_frame() {
        // ---
        let mut pattern = TestPattern::new(4);
        assert_eq!(pattern.next_frame(), vec![0, 1, 2, 3]);
        assert_eq!(pattern.next_frame(), vec![1, 2, 3, 4]);
    }
}
