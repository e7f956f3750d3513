//! Bridge between the transport substrate and per-peer sessions.
//!
//! [`TransportIntegration`] owns the session registry (friend ↔ address,
//! friend → session), registers one handler per media packet type with
//! the transport, routes inbound frames to the owning session, and hands
//! decoded media to the application through optional callbacks.
//!
//! # Locking
//!
//! Lock order is registry, then callback slot; session locks are never
//! taken while either is held. Inbound handlers clone what they need out
//! of the registry and release it before touching the session, so one
//! peer's processing never blocks routing for another.

use parking_lot::RwLock;
use peer_rtp_common::{
    Error, FriendId, MetricsContext, Packet, PacketHandler, PacketType, Providers, Result,
    Transport,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Once, Weak};
use tracing::{debug, info, warn};

use crate::pcm::samples_from_le_bytes;
use crate::session::{Session, SessionConfig};
use crate::video::VideoCodecFactory;

/// Receives decoded PCM: `(friend, samples, sample_count, channels, sampling_rate)`.
///
/// `sample_count` is samples per channel.
pub type AudioReceiveCallback = Arc<dyn Fn(FriendId, &[i16], usize, u8, u32) + Send + Sync>;

/// Receives completed video frames: `(friend, picture_id, frame)`.
pub type VideoReceiveCallback = Arc<dyn Fn(FriendId, u16, &[u8]) + Send + Sync>;

#[derive(Default)]
struct Registry {
    sessions: HashMap<FriendId, Arc<Session>>,
    addr_to_friend: HashMap<String, FriendId>,
    friend_to_addr: HashMap<FriendId, SocketAddr>,
    closed: bool,
}

/// Session registry and inbound dispatcher for one transport.
pub struct TransportIntegration {
    // ---
    transport: Arc<dyn Transport>,
    video_codecs: Arc<dyn VideoCodecFactory>,
    providers: Providers,
    config: SessionConfig,
    metrics: Option<MetricsContext>,
    registry: RwLock<Registry>,
    audio_callback: RwLock<Option<AudioReceiveCallback>>,
    video_callback: RwLock<Option<VideoReceiveCallback>>,
    handlers_registered: Once,
}

impl TransportIntegration {
    // ---
    /// Creates the integration and registers its packet handlers.
    ///
    /// # Arguments
    ///
    /// * `transport` - Substrate shared by every session
    /// * `video_codecs` - Builds each session's video packetizer/depacketizer
    /// * `providers` - Time and SSRC sources handed to each session
    /// * `config` - Session construction parameters
    /// * `metrics` - Optional registry every session records into
    pub fn new(
        transport: Arc<dyn Transport>,
        video_codecs: Arc<dyn VideoCodecFactory>,
        providers: Providers,
        config: SessionConfig,
        metrics: Option<MetricsContext>,
    ) -> Arc<Self> {
        // ---
        let integration = Arc::new(Self {
            transport,
            video_codecs,
            providers,
            config,
            metrics,
            registry: RwLock::new(Registry::default()),
            audio_callback: RwLock::new(None),
            video_callback: RwLock::new(None),
            handlers_registered: Once::new(),
        });
        integration.register_handlers();
        integration
    }

    /// Registers the audio and video handlers with the transport.
    ///
    /// Only the first call registers; later calls are no-ops. Handlers
    /// hold a weak reference, so they fail cleanly once the integration
    /// is dropped.
    pub fn register_handlers(self: &Arc<Self>) {
        // ---
        self.handlers_registered.call_once(|| {
            let audio: PacketHandler = {
                let weak = Arc::downgrade(self);
                Arc::new(move |packet: &Packet, from: SocketAddr| -> anyhow::Result<()> {
                    upgrade(&weak)?.handle_incoming_audio_frame(packet, from)?;
                    Ok(())
                })
            };
            let video: PacketHandler = {
                let weak = Arc::downgrade(self);
                Arc::new(move |packet: &Packet, from: SocketAddr| -> anyhow::Result<()> {
                    upgrade(&weak)?.handle_incoming_video_frame(packet, from)?;
                    Ok(())
                })
            };

            self.transport.register_handler(PacketType::AudioFrame, audio);
            self.transport.register_handler(PacketType::VideoFrame, video);
            debug!("Registered audio and video frame handlers");
        });
    }

    /// Creates and registers a session for `friend_id` at `addr`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The integration is closed
    /// - `friend_id` already has a session
    /// - `addr` is already registered to another friend
    /// - The video collaborators or the session cannot be built
    pub fn create_session(&self, friend_id: FriendId, addr: SocketAddr) -> Result<Arc<Session>> {
        // ---
        self.check_available(&self.registry.read(), friend_id, addr)?;

        let video = self
            .video_codecs
            .create(friend_id)
            .map_err(|e| Error::video("failed to create video codec", e))?;
        let mut session = Session::new(
            friend_id,
            addr,
            Arc::clone(&self.transport),
            video,
            &self.providers,
            &self.config,
        )?;
        if let Some(metrics) = &self.metrics {
            session = session.with_metrics(metrics.clone());
        }
        let session = Arc::new(session);

        // Re-check: another caller may have registered while we built
        let mut registry = self.registry.write();
        self.check_available(&registry, friend_id, addr)?;

        registry.sessions.insert(friend_id, Arc::clone(&session));
        registry.addr_to_friend.insert(addr.to_string(), friend_id);
        registry.friend_to_addr.insert(friend_id, addr);
        let active = registry.sessions.len();
        drop(registry);

        if let Some(m) = &self.metrics {
            m.sessions_active.set(active as i64);
        }
        info!("Registered friend {} at {} ({} sessions)", friend_id, addr, active);

        Ok(session)
    }

    fn check_available(&self, registry: &Registry, friend_id: FriendId, addr: SocketAddr) -> Result<()> {
        // ---
        if registry.closed {
            return Err(Error::IntegrationClosed);
        }
        if registry.sessions.contains_key(&friend_id) {
            return Err(Error::SessionExists(friend_id));
        }
        let key = addr.to_string();
        if let Some(&friend) = registry.addr_to_friend.get(&key) {
            return Err(Error::AddressInUse { addr: key, friend });
        }
        Ok(())
    }

    /// Session registered for `friend_id`.
    pub fn get_session(&self, friend_id: FriendId) -> Option<Arc<Session>> {
        // ---
        self.registry.read().sessions.get(&friend_id).cloned()
    }

    /// Copy of the registry; later changes do not affect it.
    pub fn get_all_sessions(&self) -> HashMap<FriendId, Arc<Session>> {
        // ---
        self.registry.read().sessions.clone()
    }

    /// Friend registered at `addr`.
    pub fn friend_for_address(&self, addr: SocketAddr) -> Option<FriendId> {
        // ---
        self.registry.read().addr_to_friend.get(&addr.to_string()).copied()
    }

    /// Address registered for `friend_id`.
    pub fn address_for_friend(&self, friend_id: FriendId) -> Option<SocketAddr> {
        // ---
        self.registry.read().friend_to_addr.get(&friend_id).copied()
    }

    /// Closes and unregisters the session for `friend_id`.
    ///
    /// The session is unregistered even if closing it reports an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if `friend_id` has no session.
    pub fn close_session(&self, friend_id: FriendId) -> Result<()> {
        // ---
        let (session, active) = {
            let mut registry = self.registry.write();
            let session = registry
                .sessions
                .remove(&friend_id)
                .ok_or(Error::SessionNotFound(friend_id))?;
            if let Some(addr) = registry.friend_to_addr.remove(&friend_id) {
                registry.addr_to_friend.remove(&addr.to_string());
            }
            (session, registry.sessions.len())
        };

        if let Some(m) = &self.metrics {
            m.sessions_active.set(active as i64);
        }

        if let Err(e) = session.close() {
            warn!("Error closing session for friend {}: {}", friend_id, e);
        }
        info!("Unregistered friend {} ({} sessions)", friend_id, active);
        Ok(())
    }

    /// Installs the callback for decoded inbound audio.
    pub fn set_audio_receive_callback<F>(&self, callback: F)
    where
        F: Fn(FriendId, &[i16], usize, u8, u32) + Send + Sync + 'static,
    {
        // ---
        *self.audio_callback.write() = Some(Arc::new(callback));
    }

    /// Installs the callback for completed inbound video frames.
    pub fn set_video_receive_callback<F>(&self, callback: F)
    where
        F: Fn(FriendId, u16, &[u8]) + Send + Sync + 'static,
    {
        // ---
        *self.video_callback.write() = Some(Arc::new(callback));
    }

    fn resolve(&self, from: SocketAddr) -> Result<(FriendId, Arc<Session>)> {
        // ---
        let registry = self.registry.read();
        let key = from.to_string();
        let friend_id = *registry
            .addr_to_friend
            .get(&key)
            .ok_or(Error::NoSessionForAddress(key))?;
        let session = registry
            .sessions
            .get(&friend_id)
            .cloned()
            .ok_or(Error::SessionNotFound(friend_id))?;
        Ok((friend_id, session))
    }

    fn record_drop(&self, kind: PacketType, from: SocketAddr, err: &Error) {
        // ---
        if let Some(m) = &self.metrics {
            m.packets_dropped_total.inc();
            if matches!(err, Error::SsrcMismatch { .. }) {
                m.ssrc_mismatches_total.inc();
            }
        }
        debug!("Dropping {:?} from {}: {}", kind, from, err);
    }

    /// Routes one inbound audio frame to its session and callback.
    ///
    /// The payload is decoded as 16-bit little-endian PCM for the callback;
    /// a trailing odd byte is ignored.
    ///
    /// # Errors
    ///
    /// Returns error if `from` has no session or the session rejects the
    /// packet.
    pub fn handle_incoming_audio_frame(&self, packet: &Packet, from: SocketAddr) -> Result<()> {
        // ---
        let result = self.resolve(from).and_then(|(friend_id, session)| {
            let (payload, _) = session.receive_packet(&packet.data)?;
            Ok((friend_id, session, payload))
        });
        let (friend_id, session, payload) = match result {
            Ok(routed) => routed,
            Err(e) => {
                self.record_drop(PacketType::AudioFrame, from, &e);
                return Err(e);
            }
        };

        let samples = samples_from_le_bytes(&payload);
        if samples.is_empty() {
            return Ok(());
        }

        let callback = self.audio_callback.read().clone();
        if let Some(callback) = callback {
            let config = session.audio_config();
            let sample_count = samples.len() / config.channels as usize;
            callback(
                friend_id,
                &samples,
                sample_count,
                config.channels,
                config.sampling_rate,
            );
        }

        Ok(())
    }

    /// Routes one inbound video frame to its session; completed frames go
    /// to the video callback.
    ///
    /// # Errors
    ///
    /// Returns error if `from` has no session or the session rejects the
    /// packet.
    pub fn handle_incoming_video_frame(&self, packet: &Packet, from: SocketAddr) -> Result<()> {
        // ---
        let result = self.resolve(from).and_then(|(friend_id, session)| {
            let (frame, picture_id) = session.receive_video_packet(&packet.data)?;
            Ok((friend_id, frame, picture_id))
        });
        let (friend_id, frame, picture_id) = match result {
            Ok(routed) => routed,
            Err(e) => {
                self.record_drop(PacketType::VideoFrame, from, &e);
                return Err(e);
            }
        };

        let Some(frame) = frame else {
            return Ok(());
        };

        let callback = self.video_callback.read().clone();
        if let Some(callback) = callback {
            callback(friend_id, picture_id, &frame);
        }

        Ok(())
    }

    /// Closes every session and refuses new ones.
    ///
    /// Closing is best-effort: a session that fails to close is logged and
    /// the rest are still closed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IntegrationClosed`] if already closed.
    pub fn close(&self) -> Result<()> {
        // ---
        let sessions = {
            let mut registry = self.registry.write();
            if registry.closed {
                return Err(Error::IntegrationClosed);
            }
            registry.closed = true;
            registry.addr_to_friend.clear();
            registry.friend_to_addr.clear();
            std::mem::take(&mut registry.sessions)
        };

        if let Some(m) = &self.metrics {
            m.sessions_active.set(0);
        }

        let count = sessions.len();
        for (friend_id, session) in sessions {
            if let Err(e) = session.close() {
                warn!("Error closing session for friend {}: {}", friend_id, e);
            }
        }
        info!("Transport integration closed ({} sessions released)", count);
        Ok(())
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        // ---
        self.registry.read().closed
    }
}

fn upgrade(weak: &Weak<TransportIntegration>) -> anyhow::Result<Arc<TransportIntegration>> {
    // ---
    weak.upgrade()
        .ok_or_else(|| anyhow::anyhow!("transport integration has been dropped"))
}
