//! Error types for the media transport core.
//!
//! Every failure is returned to the caller; nothing here is fatal to the
//! process. Variants are grouped by where the failure originates.

use crate::transport::FriendId;

/// Result type alias using the media transport [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used to carry failures from external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by packetizers, sessions and the transport registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --- Validation
    /// A required payload was empty
    #[error("empty payload")]
    EmptyPayload,

    /// Clock rate of zero was supplied
    #[error("invalid clock rate: {0} Hz")]
    InvalidClockRate(u32),

    /// Packet shorter than the fixed RTP header
    #[error("packet too small: {len} bytes (minimum {min})")]
    PacketTooShort { len: usize, min: usize },

    /// Header field out of its wire range
    #[error("invalid RTP header: {0}")]
    InvalidHeader(String),

    // --- Protocol violations
    /// RTP version other than 2
    #[error("invalid RTP version: {0}")]
    InvalidVersion(u8),

    /// Packet SSRC differs from the SSRC the depacketizer is bound to
    #[error("SSRC mismatch: bound to 0x{expected:08X}, got 0x{actual:08X}")]
    SsrcMismatch { expected: u32, actual: u32 },

    // --- Substrate / collaborator failures
    /// Transport substrate refused the packet
    #[error("{context}")]
    Transport {
        context: String,
        #[source]
        source: BoxError,
    },

    /// SSRC provider failed
    #[error("failed to generate SSRC")]
    SsrcGeneration(#[source] BoxError),

    /// External video packetizer/depacketizer failed
    #[error("video codec error: {context}")]
    Video {
        context: String,
        #[source]
        source: BoxError,
    },

    // --- Routing
    /// Inbound packet from an address with no registered friend
    #[error("no session found for address {0}")]
    NoSessionForAddress(String),

    /// Control operation on a friend without a session
    #[error("no session found for friend {0}")]
    SessionNotFound(FriendId),

    /// Second session for the same friend
    #[error("session already exists for friend {0}")]
    SessionExists(FriendId),

    /// Address already mapped to another friend
    #[error("address {addr} already registered to friend {friend}")]
    AddressInUse { addr: String, friend: FriendId },

    // --- Lifecycle
    /// Operation on a closed session
    #[error("session not initialized")]
    NotInitialized,

    /// Operation on a closed transport integration
    #[error("transport integration is closed")]
    IntegrationClosed,
}

impl Error {
    // ---
    /// Wraps a transport substrate failure with context.
    pub fn transport(context: impl Into<String>, source: anyhow::Error) -> Self {
        // ---
        Error::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Wraps a video collaborator failure with context.
    pub fn video(context: impl Into<String>, source: anyhow::Error) -> Self {
        // ---
        Error::Video {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Returns `true` for errors caused by malformed or foreign packets.
    pub fn is_protocol_violation(&self) -> bool {
        // ---
        matches!(
            self,
            Error::InvalidVersion(_) | Error::SsrcMismatch { .. } | Error::PacketTooShort { .. }
        )
    }
}
