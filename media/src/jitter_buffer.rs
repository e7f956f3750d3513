//! Jitter buffer for RTP payload reordering and delay compensation.
//!
//! Payloads are kept sorted by RTP timestamp and released one at a time,
//! no faster than one per `buffer_time`. Ordering by timestamp (not arrival)
//! absorbs network reordering; the release gate bounds playout latency no
//! matter how bursty arrival is; the capacity bound caps memory when a peer
//! floods us.

use peer_rtp_common::TimeProvider;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Capacity used when none (or zero) is configured
pub const DEFAULT_MAX_CAPACITY: usize = 100;

/// Default release interval (3 frames @ 20ms)
pub const DEFAULT_BUFFER_TIME: Duration = Duration::from_millis(60);

/// Jitter buffer configuration.
#[derive(Debug, Clone)]
pub struct JitterBufferConfig {
    // ---
    /// Minimum spacing between two successful releases
    pub buffer_time: Duration,

    /// Maximum entries held before the oldest is evicted
    pub max_capacity: usize,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        // ---
        Self {
            buffer_time: DEFAULT_BUFFER_TIME,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

/// One buffered payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedEntry {
    // ---
    /// RTP timestamp the payload was received with
    pub timestamp: u32,

    /// Opaque payload bytes
    pub data: Vec<u8>,
}

/// Timestamp-ordered, capacity-bounded jitter buffer.
///
/// # Design
///
/// - **Timestamp ordering**: insertion position found by binary search;
///   duplicate timestamps are kept as separate entries, in arrival order
/// - **Time-gated release**: `get` succeeds at most once per `buffer_time`
/// - **Bounded**: when full, the oldest entry is evicted before inserting,
///   so even a very old latecomer is admitted
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use media::jitter_buffer::{JitterBuffer, JitterBufferConfig};
/// use peer_rtp_common::ManualClock;
/// use std::time::Duration;
///
/// let clock = Arc::new(ManualClock::new());
/// let config = JitterBufferConfig {
///     buffer_time: Duration::from_millis(20),
///     max_capacity: 10,
/// };
/// let mut buffer = JitterBuffer::new(config, clock.clone());
///
/// buffer.add(960, vec![2]);
/// buffer.add(0, vec![1]);
///
/// clock.advance(Duration::from_millis(20));
/// assert_eq!(buffer.get(), Some(vec![1]));
/// assert_eq!(buffer.get(), None); // gate not yet re-opened
/// ```
pub struct JitterBuffer {
    // ---
    /// Buffer configuration
    config: JitterBufferConfig,

    /// Buffered payloads sorted by timestamp
    entries: VecDeque<BufferedEntry>,

    /// Instant of the last successful release (or creation/reset)
    last_dequeue: Instant,

    /// Injected clock
    clock: Arc<dyn TimeProvider>,
}

impl JitterBuffer {
    // ---
    /// Creates an empty buffer; the release gate starts counting now.
    ///
    /// A zero capacity in `config` is replaced by [`DEFAULT_MAX_CAPACITY`].
    pub fn new(mut config: JitterBufferConfig, clock: Arc<dyn TimeProvider>) -> Self {
        // ---
        if config.max_capacity == 0 {
            config.max_capacity = DEFAULT_MAX_CAPACITY;
        }
        let last_dequeue = clock.now();

        Self {
            config,
            entries: VecDeque::new(),
            last_dequeue,
            clock,
        }
    }

    /// Inserts a payload in timestamp order.
    ///
    /// If the buffer is full the oldest entry is evicted first and the
    /// insertion index shifted to account for it.
    pub fn add(&mut self, timestamp: u32, data: Vec<u8>) {
        // ---
        // Insert after any entries with an equal timestamp
        let mut pos = self.entries.partition_point(|e| e.timestamp <= timestamp);

        if self.entries.len() >= self.config.max_capacity {
            if let Some(evicted) = self.entries.pop_front() {
                warn!(
                    "Jitter buffer full ({} entries), dropping oldest ts={}",
                    self.config.max_capacity, evicted.timestamp
                );
                pos = pos.saturating_sub(1);
            }
        }

        self.entries.insert(pos, BufferedEntry { timestamp, data });
    }

    /// Releases the oldest payload if the release gate is open.
    ///
    /// Returns `None` when less than `buffer_time` has elapsed since the
    /// last release, or when the buffer is empty. Never blocks.
    pub fn get(&mut self) -> Option<Vec<u8>> {
        // ---
        self.get_entry().map(|entry| entry.data)
    }

    /// Like [`get`](Self::get) but also returns the entry's timestamp.
    pub fn get_entry(&mut self) -> Option<BufferedEntry> {
        // ---
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_dequeue) < self.config.buffer_time {
            return None;
        }

        let entry = self.entries.pop_front()?;
        self.last_dequeue = now;
        Some(entry)
    }

    /// Changes the capacity, evicting oldest entries if now over the limit.
    ///
    /// Zero resets the capacity to [`DEFAULT_MAX_CAPACITY`].
    pub fn set_max_capacity(&mut self, max_capacity: usize) {
        // ---
        self.config.max_capacity = if max_capacity == 0 {
            DEFAULT_MAX_CAPACITY
        } else {
            max_capacity
        };

        let excess = self.entries.len().saturating_sub(self.config.max_capacity);
        if excess > 0 {
            debug!("Capacity lowered, evicting {} oldest entries", excess);
            self.entries.drain(..excess);
        }
    }

    /// Discards every entry and re-arms the release gate.
    pub fn reset(&mut self) {
        // ---
        self.entries.clear();
        self.last_dequeue = self.clock.now();
    }

    /// Number of buffered entries.
    pub fn len(&self) -> usize {
        // ---
        self.entries.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        // ---
        self.entries.is_empty()
    }

    /// Current capacity.
    pub fn max_capacity(&self) -> usize {
        // ---
        self.config.max_capacity
    }

    /// Configured release interval.
    pub fn buffer_time(&self) -> Duration {
        // ---
        self.config.buffer_time
    }

    /// Returns current buffer status for observability.
    pub fn status(&self) -> JitterBufferStatus {
        // ---
        JitterBufferStatus {
            buffered_packets: self.entries.len(),
            max_capacity: self.config.max_capacity,
            oldest_timestamp: self.entries.front().map(|e| e.timestamp),
            newest_timestamp: self.entries.back().map(|e| e.timestamp),
        }
    }
}

/// Jitter buffer status for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitterBufferStatus {
    pub buffered_packets: usize,
    pub max_capacity: usize,
    pub oldest_timestamp: Option<u32>,
    pub newest_timestamp: Option<u32>,
}
