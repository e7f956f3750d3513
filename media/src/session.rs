//! Per-peer media session.
//!
//! A [`Session`] bundles everything one remote peer needs: the outbound
//! audio packetizer, the inbound audio depacketizer with its jitter buffer,
//! and the outbound/inbound video collaborators. It is created active and
//! moves to closed exactly once; after that every media operation fails
//! with [`Error::NotInitialized`].
//!
//! # Locking
//!
//! The lifecycle lock is held only long enough to clone the active media
//! handle. Component locks (packetizer counters, depacketizer state, video
//! state) and the statistics lock are taken afterwards, one at a time, so
//! no path holds two session locks at once.

use parking_lot::{Mutex, RwLock};
use peer_rtp_common::{
    Error, FriendId, MetricsContext, Packet, PacketType, Providers, Result, TimeProvider,
    Transport,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::depacketizer::AudioDepacketizer;
use crate::jitter_buffer::{JitterBufferConfig, JitterBufferStatus};
use crate::packetizer::{AudioPacketizer, DEFAULT_AUDIO_CLOCK_RATE};
use crate::stats::{ReceiveStats, Statistics};
use crate::video::{
    deserialize_video_rtp_packet, next_picture_id, serialize_video_rtp_packet, video_timestamp,
    VideoCodec, VideoDepacketizer, VideoPacketizer,
};

/// Default channel count for received PCM
pub const DEFAULT_CHANNELS: u8 = 1;

/// Default sampling rate for received PCM (Hz)
pub const DEFAULT_SAMPLING_RATE: u32 = 48_000;

/// Picture ID carried by the first video frame of a session
pub const INITIAL_PICTURE_ID: u16 = 1;

/// Kind of media a received payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Video,
}

/// Format metadata reported alongside received PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    // ---
    pub channels: u8,
    pub sampling_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        // ---
        Self {
            channels: DEFAULT_CHANNELS,
            sampling_rate: DEFAULT_SAMPLING_RATE,
        }
    }
}

impl AudioConfig {
    // ---
    /// Replaces zero fields with their defaults.
    pub fn normalized(self) -> Self {
        // ---
        Self {
            channels: if self.channels == 0 {
                DEFAULT_CHANNELS
            } else {
                self.channels
            },
            sampling_rate: if self.sampling_rate == 0 {
                DEFAULT_SAMPLING_RATE
            } else {
                self.sampling_rate
            },
        }
    }
}

/// Construction parameters shared by every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    // ---
    /// Jitter buffer for inbound audio
    pub jitter_buffer: JitterBufferConfig,

    /// RTP clock rate of the outbound audio stream (Hz)
    pub audio_clock_rate: u32,

    /// Format reported with received PCM
    pub audio: AudioConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        // ---
        Self {
            jitter_buffer: JitterBufferConfig::default(),
            audio_clock_rate: DEFAULT_AUDIO_CLOCK_RATE,
            audio: AudioConfig::default(),
        }
    }
}

/// Outbound video state: the packetizer and the next picture ID.
struct VideoSender {
    packetizer: Box<dyn VideoPacketizer>,
    picture_id: u16,
}

/// Media components owned by an active session.
struct ActiveMedia {
    audio_tx: AudioPacketizer,
    audio_rx: AudioDepacketizer,
    video_tx: Mutex<VideoSender>,
    video_rx: Mutex<Box<dyn VideoDepacketizer>>,
}

enum Lifecycle {
    Active(Arc<ActiveMedia>),
    Closed,
}

/// Media session with one remote peer.
pub struct Session {
    // ---
    friend_id: FriendId,
    remote_addr: SocketAddr,
    created_at: Instant,
    clock: Arc<dyn TimeProvider>,
    transport: Arc<dyn Transport>,
    state: RwLock<Lifecycle>,
    audio_config: RwLock<AudioConfig>,
    stats: RwLock<Statistics>,
    metrics: Option<MetricsContext>,
}

impl Session {
    // ---
    /// Creates an active session for `friend_id` at `remote_addr`.
    ///
    /// # Arguments
    ///
    /// * `friend_id` - Peer identifier
    /// * `remote_addr` - Peer network address
    /// * `transport` - Substrate used for every outbound packet
    /// * `video` - Video packetizer/depacketizer for this peer
    /// * `providers` - Time and SSRC sources
    /// * `config` - Jitter buffer, clock rate and audio format
    ///
    /// # Errors
    ///
    /// Returns error if the audio packetizer cannot be built (zero clock
    /// rate or SSRC generation failure).
    pub fn new(
        friend_id: FriendId,
        remote_addr: SocketAddr,
        transport: Arc<dyn Transport>,
        video: VideoCodec,
        providers: &Providers,
        config: &SessionConfig,
    ) -> Result<Self> {
        // ---
        let audio_tx = AudioPacketizer::new(
            config.audio_clock_rate,
            Arc::clone(&transport),
            remote_addr,
            providers.ssrc.as_ref(),
        )?;
        let audio_rx =
            AudioDepacketizer::new(config.jitter_buffer.clone(), Arc::clone(&providers.time));

        let media = ActiveMedia {
            audio_tx,
            audio_rx,
            video_tx: Mutex::new(VideoSender {
                packetizer: video.packetizer,
                picture_id: INITIAL_PICTURE_ID,
            }),
            video_rx: Mutex::new(video.depacketizer),
        };

        let created_at = providers.time.now();
        info!("Session created for friend {} at {}", friend_id, remote_addr);

        Ok(Self {
            friend_id,
            remote_addr,
            created_at,
            clock: Arc::clone(&providers.time),
            transport,
            state: RwLock::new(Lifecycle::Active(Arc::new(media))),
            audio_config: RwLock::new(config.audio.normalized()),
            stats: RwLock::new(Statistics::new(created_at)),
            metrics: None,
        })
    }

    /// Records into `metrics` from now on.
    pub fn with_metrics(mut self, metrics: MetricsContext) -> Self {
        // ---
        self.metrics = Some(metrics);
        self
    }

    fn active(&self) -> Result<Arc<ActiveMedia>> {
        // ---
        match &*self.state.read() {
            Lifecycle::Active(media) => Ok(Arc::clone(media)),
            Lifecycle::Closed => Err(Error::NotInitialized),
        }
    }

    /// Sends one encoded audio frame.
    ///
    /// # Arguments
    ///
    /// * `data` - Encoded audio frame
    /// * `sample_count` - Samples (per channel) the frame covers; advances the RTP timestamp
    ///
    /// # Errors
    ///
    /// Returns error if the session is closed, `data` is empty, or the
    /// transport rejects the packet.
    pub fn send_audio_packet(&self, data: &[u8], sample_count: u32) -> Result<()> {
        // ---
        let media = self.active()?;
        let timer = self.metrics.as_ref().map(|m| m.send_seconds.start_timer());

        let bytes = media.audio_tx.packetize_and_send(data, sample_count)?;

        {
            let mut stats = self.stats.write();
            stats.packets_sent += 1;
            stats.bytes_sent += bytes as u64;
        }

        if let Some(m) = &self.metrics {
            m.packets_sent_total.inc();
            m.bytes_sent_total.inc_by(bytes as u64);
        }
        if let Some(timer) = timer {
            timer.observe_duration();
        }

        Ok(())
    }

    /// Fragments and sends one encoded video frame.
    ///
    /// The picture ID advances only after every fragment was accepted by
    /// the transport. Fragments sent before a failure still count toward
    /// the statistics.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The session is closed
    /// - `data` is empty
    /// - The video packetizer fails
    /// - A fragment cannot be serialized or sent
    pub fn send_video_packet(&self, data: &[u8]) -> Result<()> {
        // ---
        let media = self.active()?;
        if data.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let timer = self.metrics.as_ref().map(|m| m.send_seconds.start_timer());
        let timestamp = video_timestamp(self.clock.now().saturating_duration_since(self.created_at));

        let mut video = media.video_tx.lock();
        let picture_id = video.picture_id;

        let packets = video
            .packetizer
            .packetize_frame(data, timestamp, picture_id)
            .map_err(|e| Error::video("failed to packetize video frame", e))?;

        let mut sent_packets = 0u64;
        let mut sent_bytes = 0u64;
        let mut outcome = Ok(());

        for packet in &packets {
            let wire = match serialize_video_rtp_packet(packet) {
                Ok(wire) => wire,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };
            let len = wire.len() as u64;

            if let Err(e) = self
                .transport
                .send(&Packet::new(PacketType::VideoFrame, wire), self.remote_addr)
            {
                outcome = Err(Error::transport(
                    format!(
                        "failed to send video fragment seq={} picture_id={}",
                        packet.header.sequence, picture_id
                    ),
                    e,
                ));
                break;
            }

            sent_packets += 1;
            sent_bytes += len;
        }

        if outcome.is_ok() {
            video.picture_id = next_picture_id(picture_id);
        }
        drop(video);

        {
            let mut stats = self.stats.write();
            stats.packets_sent += sent_packets;
            stats.bytes_sent += sent_bytes;
        }

        if let Some(m) = &self.metrics {
            m.packets_sent_total.inc_by(sent_packets);
            m.bytes_sent_total.inc_by(sent_bytes);
            if outcome.is_ok() {
                m.video_frames_sent_total.inc();
            }
        }
        if let Some(timer) = timer {
            timer.observe_duration();
        }

        if outcome.is_ok() {
            debug!(
                "Sent video frame picture_id={} to friend {} in {} fragments",
                picture_id,
                self.friend_id,
                packets.len()
            );
        }

        outcome
    }

    /// Processes one inbound audio RTP packet.
    ///
    /// # Returns
    ///
    /// Tuple of (payload, media type)
    ///
    /// # Errors
    ///
    /// Returns error if the session is closed or the depacketizer rejects
    /// the packet (empty, malformed, foreign SSRC).
    pub fn receive_packet(&self, data: &[u8]) -> Result<(Vec<u8>, MediaType)> {
        // ---
        let media = self.active()?;

        let gaps_before = media.audio_rx.stats().sequence_gaps;
        let (payload, _timestamp) = media.audio_rx.process_packet(data)?;

        {
            let mut stats = self.stats.write();
            stats.packets_received += 1;
            stats.bytes_received += data.len() as u64;
        }

        if let Some(m) = &self.metrics {
            m.packets_received_total.inc();
            m.bytes_received_total.inc_by(data.len() as u64);

            let rx = media.audio_rx.stats();
            m.sequence_gaps_total
                .inc_by(rx.sequence_gaps.saturating_sub(gaps_before));
            m.jitter_buffer_occupancy_packets
                .set(media.audio_rx.buffer_status().buffered_packets as i64);
        }

        Ok((payload, MediaType::Audio))
    }

    /// Processes one inbound video RTP packet.
    ///
    /// # Returns
    ///
    /// Tuple of (complete frame, or `None` while still assembling; picture ID)
    ///
    /// # Errors
    ///
    /// Returns error if the session is closed, the packet is shorter than
    /// the RTP header, or the video depacketizer fails.
    pub fn receive_video_packet(&self, data: &[u8]) -> Result<(Option<Vec<u8>>, u16)> {
        // ---
        let media = self.active()?;

        let packet = deserialize_video_rtp_packet(data)?;
        let sequence = packet.header.sequence;

        let (frame, picture_id) = media
            .video_rx
            .lock()
            .process_packet(packet)
            .map_err(|e| Error::video(format!("failed to process video packet seq={}", sequence), e))?;

        {
            let mut stats = self.stats.write();
            stats.packets_received += 1;
            stats.bytes_received += data.len() as u64;
        }

        if let Some(m) = &self.metrics {
            m.packets_received_total.inc();
            m.bytes_received_total.inc_by(data.len() as u64);
            if frame.is_some() {
                m.video_frames_completed_total.inc();
            }
        }

        Ok((frame, picture_id))
    }

    /// Pulls the next due audio payload from the jitter buffer.
    ///
    /// Returns `None` when nothing is due or the session is closed.
    pub fn get_buffered_audio(&self) -> Option<Vec<u8>> {
        // ---
        self.active().ok()?.audio_rx.get_buffered_audio()
    }

    /// Copy of the traffic counters.
    pub fn statistics(&self) -> Statistics {
        // ---
        *self.stats.read()
    }

    /// Loss/reordering counters of the inbound audio stream.
    pub fn receive_stats(&self) -> Option<ReceiveStats> {
        // ---
        self.active().ok().map(|media| media.audio_rx.stats())
    }

    /// Jitter buffer snapshot, while the session is active.
    pub fn buffer_status(&self) -> Option<JitterBufferStatus> {
        // ---
        self.active().ok().map(|media| media.audio_rx.buffer_status())
    }

    /// SSRC of the outbound audio stream, while the session is active.
    pub fn audio_ssrc(&self) -> Option<u32> {
        // ---
        self.active().ok().map(|media| media.audio_tx.ssrc())
    }

    /// Format reported with received PCM.
    pub fn audio_config(&self) -> AudioConfig {
        // ---
        *self.audio_config.read()
    }

    /// Updates the reported PCM format; zero fields fall back to defaults.
    pub fn set_audio_config(&self, config: AudioConfig) {
        // ---
        *self.audio_config.write() = config.normalized();
    }

    pub fn friend_id(&self) -> FriendId {
        // ---
        self.friend_id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        // ---
        self.remote_addr
    }

    pub fn created_at(&self) -> Instant {
        // ---
        self.created_at
    }

    pub fn is_closed(&self) -> bool {
        // ---
        matches!(*self.state.read(), Lifecycle::Closed)
    }

    /// Releases every media component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the session was already closed.
    pub fn close(&self) -> Result<()> {
        // ---
        let previous = std::mem::replace(&mut *self.state.write(), Lifecycle::Closed);
        match previous {
            Lifecycle::Active(_) => {
                let stats = self.statistics();
                info!(
                    "Session closed for friend {}: {} packets sent, {} received",
                    self.friend_id, stats.packets_sent, stats.packets_received
                );
                Ok(())
            }
            Lifecycle::Closed => Err(Error::NotInitialized),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // ---
        f.debug_struct("Session")
            .field("friend_id", &self.friend_id)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::testing::{FixedSsrc, RecordingTransport};
    use crate::video::{VideoRtpPacket, MAX_PICTURE_ID};
    use crate::vp8::{Vp8Depacketizer, Vp8Packetizer};
    use peer_rtp_common::{ManualClock, RtpPacket};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Fixture {
        session: Session,
        transport: Arc<RecordingTransport>,
        clock: Arc<ManualClock>,
    }

    fn remote() -> SocketAddr {
        "127.0.0.1:33445".parse().expect("valid addr")
    }

    fn vp8(max_payload_size: usize) -> VideoCodec {
        VideoCodec {
            packetizer: Box::new(
                Vp8Packetizer::new(max_payload_size, &FixedSsrc(0xBEEF)).expect("packetizer"),
            ),
            depacketizer: Box::new(Vp8Depacketizer::new()),
        }
    }

    fn fixture() -> Fixture {
        // ---
        let transport = Arc::new(RecordingTransport::default());
        let clock = Arc::new(ManualClock::new());
        let providers = Providers::new(clock.clone(), Arc::new(FixedSsrc(0xA0D10)));
        let config = SessionConfig {
            jitter_buffer: JitterBufferConfig {
                buffer_time: Duration::from_millis(20),
                max_capacity: 16,
            },
            ..Default::default()
        };

        let session = Session::new(7, remote(), transport.clone(), vp8(100), &providers, &config)
            .expect("session creation failed");

        Fixture {
            session,
            transport,
            clock,
        }
    }

    #[test]
    fn test_send_audio_updates_statistics() {
        // ---
        let f = fixture();
        f.session.send_audio_packet(&[1, 2, 3, 4], 960).expect("send");
        f.session.send_audio_packet(&[5, 6], 960).expect("send");

        let stats = f.session.statistics();
        assert_eq!(stats.packets_sent, 2);
        assert_eq!(stats.bytes_sent, (12 + 4) + (12 + 2));

        let sent = f.transport.sent();
        let second = RtpPacket::deserialize(&sent[1].0.data).expect("valid RTP");
        assert_eq!(second.header.sequence, 1);
        assert_eq!(second.header.timestamp, 960);
        assert_eq!(second.header.ssrc, 0xA0D10);
    }

    #[test]
    fn test_failed_audio_send_not_counted() {
        // ---
        let f = fixture();
        f.transport.fail_sends.store(true, Ordering::SeqCst);

        assert!(matches!(
            f.session.send_audio_packet(&[1], 960),
            Err(Error::Transport { .. })
        ));
        assert_eq!(f.session.statistics().packets_sent, 0);
    }

    #[test]
    fn test_video_frame_timestamp_and_picture_id() {
        // ---
        let f = fixture();
        f.clock.advance(Duration::from_millis(100));
        f.session.send_video_packet(&[0xAB; 250]).expect("send");
        f.session.send_video_packet(&[0xCD; 10]).expect("send");

        let sent = f.transport.take_sent();
        assert_eq!(sent.len(), 3 + 1);

        let first = deserialize_video_rtp_packet(&sent[0].0.data).expect("valid");
        assert_eq!(sent[0].0.kind, PacketType::VideoFrame);
        assert_eq!(first.header.timestamp, 9000);
        assert_eq!(first.picture_id, INITIAL_PICTURE_ID);

        let last = deserialize_video_rtp_packet(&sent[3].0.data).expect("valid");
        assert_eq!(last.picture_id, INITIAL_PICTURE_ID + 1);
        assert!(last.header.marker);

        assert_eq!(f.session.statistics().packets_sent, 4);
    }

    #[test]
    fn test_failed_video_send_keeps_picture_id() {
        // ---
        let f = fixture();
        f.transport.fail_sends.store(true, Ordering::SeqCst);
        assert!(f.session.send_video_packet(&[1; 20]).is_err());

        f.transport.fail_sends.store(false, Ordering::SeqCst);
        f.session.send_video_packet(&[1; 20]).expect("send");

        let sent = f.transport.sent();
        let packet = deserialize_video_rtp_packet(&sent[0].0.data).expect("valid");
        assert_eq!(packet.picture_id, INITIAL_PICTURE_ID);
    }

    #[test]
    fn test_empty_video_rejected() {
        // ---
        let f = fixture();
        assert!(matches!(
            f.session.send_video_packet(&[]),
            Err(Error::EmptyPayload)
        ));
    }

    #[test]
    fn test_video_round_trip_between_sessions() {
        // ---
        let sender = fixture();
        let receiver = fixture();

        let frame: Vec<u8> = (0..300u16).map(|i| (i % 256) as u8).collect();
        sender.session.send_video_packet(&frame).expect("send");

        let mut completed = None;
        for (packet, _) in sender.transport.sent() {
            let (assembled, picture_id) = receiver
                .session
                .receive_video_packet(&packet.data)
                .expect("receive");
            assert_eq!(picture_id, INITIAL_PICTURE_ID);
            if assembled.is_some() {
                completed = assembled;
            }
        }
        assert_eq!(completed, Some(frame));
    }

    #[test]
    fn test_undersized_video_rejected() {
        // ---
        let f = fixture();
        assert!(matches!(
            f.session.receive_video_packet(&[0x80; 11]),
            Err(Error::PacketTooShort { .. })
        ));
        assert_eq!(f.session.statistics().packets_received, 0);
    }

    #[test]
    fn test_video_depacketizer_failure_surfaces() {
        // ---
        let f = fixture();
        let packet = VideoRtpPacket {
            header: peer_rtp_common::RtpHeader::new(97, 0, 0, 1),
            payload: Vec::new(),
            picture_id: 0,
        };
        let wire = serialize_video_rtp_packet(&packet).expect("serialize");
        assert!(matches!(
            f.session.receive_video_packet(&wire),
            Err(Error::Video { .. })
        ));
    }

    #[test]
    fn test_receive_and_buffer_audio() {
        // ---
        let f = fixture();
        let wire = RtpPacket::new(0, 0, 0x77, vec![1, 0, 2, 0])
            .serialize()
            .expect("serialize");

        let (payload, kind) = f.session.receive_packet(&wire).expect("receive");
        assert_eq!(payload, vec![1, 0, 2, 0]);
        assert_eq!(kind, MediaType::Audio);

        assert_eq!(f.session.get_buffered_audio(), None);
        f.clock.advance(Duration::from_millis(20));
        assert_eq!(f.session.get_buffered_audio(), Some(vec![1, 0, 2, 0]));

        let stats = f.session.statistics();
        assert_eq!(stats.packets_received, 1);
        assert_eq!(stats.bytes_received, 16);
    }

    #[test]
    fn test_audio_config_defaults_for_zero() {
        // ---
        let f = fixture();
        f.session.set_audio_config(AudioConfig {
            channels: 0,
            sampling_rate: 0,
        });
        assert_eq!(f.session.audio_config(), AudioConfig::default());

        f.session.set_audio_config(AudioConfig {
            channels: 2,
            sampling_rate: 0,
        });
        assert_eq!(
            f.session.audio_config(),
            AudioConfig {
                channels: 2,
                sampling_rate: 48_000
            }
        );
    }

    #[test]
    fn test_closed_session_rejects_media() {
        // ---
        let f = fixture();
        f.session.close().expect("close");
        assert!(f.session.is_closed());

        assert!(matches!(
            f.session.send_audio_packet(&[1], 960),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            f.session.send_video_packet(&[1]),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            f.session.receive_packet(&[0x80; 12]),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(
            f.session.receive_video_packet(&[0x80; 12]),
            Err(Error::NotInitialized)
        ));
        assert_eq!(f.session.get_buffered_audio(), None);
        assert_eq!(f.session.audio_ssrc(), None);

        // Second close reports the lifecycle error
        assert!(matches!(f.session.close(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_picture_id_never_zero_after_15_bit_wrap() {
        // ---
        let sender = fixture();
        let receiver = fixture();

        let mut expected = INITIAL_PICTURE_ID;
        for _ in 0..(MAX_PICTURE_ID as usize + 2) {
            sender.session.send_video_packet(&[0x42]).expect("send");
            let sent = sender.transport.take_sent();
            assert_eq!(sent.len(), 1);

            let (frame, picture_id) = receiver
                .session
                .receive_video_packet(&sent[0].0.data)
                .expect("receive");
            assert!(frame.is_some());
            assert_ne!(picture_id, 0);
            assert_eq!(picture_id, expected);
            expected = next_picture_id(expected);
        }
        // Frames 0x8000 and 0x8001 carried IDs 1 and 2
        assert_eq!(expected, 3);
    }

    #[test]
    fn test_close_racing_sends() {
        // ---
        let f = fixture();
        let session = Arc::new(f.session);

        let senders: Vec<_> = (0..4)
            .map(|i| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    let mut ok = 0u64;
                    for _ in 0..500 {
                        let result = if i % 2 == 0 {
                            session.send_audio_packet(&[1, 2], 960)
                        } else {
                            session.send_video_packet(&[3; 10])
                        };
                        match result {
                            Ok(()) => ok += 1,
                            Err(Error::NotInitialized) => {}
                            Err(e) => panic!("unexpected send error: {e}"),
                        }
                    }
                    ok
                })
            })
            .collect();

        let closer = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || {
                std::thread::yield_now();
                session.close()
            })
        };

        let delivered: u64 = senders
            .into_iter()
            .map(|h| h.join().expect("sender thread panicked"))
            .sum();
        closer
            .join()
            .expect("closer thread panicked")
            .expect("close");

        assert!(session.is_closed());
        // Every accepted send is a single packet and was fully counted
        assert_eq!(session.statistics().packets_sent, delivered);
        assert_eq!(f.transport.sent().len() as u64, delivered);
        assert!(matches!(
            session.send_audio_packet(&[1], 960),
            Err(Error::NotInitialized)
        ));
    }
}
