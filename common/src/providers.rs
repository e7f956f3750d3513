//! Capability traits for wall-clock time and SSRC generation.
//!
//! The media core never reads the clock or a random source directly. The
//! composition root builds a [`Providers`] value (usually
//! [`Providers::system`]) and passes it to every constructor, so tests can
//! substitute a [`ManualClock`] or a fixed SSRC.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current time.
pub trait TimeProvider: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Source of RTP synchronization source identifiers.
pub trait SsrcProvider: Send + Sync {
    /// Generates a fresh SSRC.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying entropy source fails.
    fn generate_ssrc(&self) -> anyhow::Result<u32>;
}

/// Monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        // ---
        Instant::now()
    }
}

/// SSRC generator backed by the thread-local RNG.
///
/// Never yields zero so an SSRC is always distinguishable from an unset
/// value in logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSsrcProvider;

impl SsrcProvider for RandomSsrcProvider {
    fn generate_ssrc(&self) -> anyhow::Result<u32> {
        // ---
        loop {
            let ssrc = rand::random::<u32>();
            if ssrc != 0 {
                return Ok(ssrc);
            }
        }
    }
}

/// Manually advanced clock for deterministic tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    // ---
    now: Mutex<Instant>,
}

impl ManualClock {
    // ---
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        // ---
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        // ---
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        // ---
        Self::new()
    }
}

impl TimeProvider for ManualClock {
    fn now(&self) -> Instant {
        // ---
        *self.now.lock()
    }
}

/// Bundle of injected capabilities.
#[derive(Clone)]
pub struct Providers {
    // ---
    /// Clock used for jitter-buffer gating and video timestamps
    pub time: Arc<dyn TimeProvider>,

    /// Generator for packetizer SSRCs
    pub ssrc: Arc<dyn SsrcProvider>,
}

impl Providers {
    // ---
    /// Creates a bundle from explicit providers.
    pub fn new(time: Arc<dyn TimeProvider>, ssrc: Arc<dyn SsrcProvider>) -> Self {
        // ---
        Self { time, ssrc }
    }

    /// Production providers: system clock and random SSRCs.
    pub fn system() -> Self {
        // ---
        Self::new(Arc::new(SystemTimeProvider), Arc::new(RandomSsrcProvider))
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // ---
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}
