//! Peer RTP receiver library.
//!
//! Drives playout for one peer session: drains the session's jitter buffer
//! on a fixed tick, records the audio, and periodically logs reception
//! statistics.

pub mod recorder;

pub use recorder::WavRecorder;

use anyhow::Result;
use media::Session;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Playout loop timing.
#[derive(Debug, Clone)]
pub struct PlayoutConfig {
    // ---
    /// How often the jitter buffer is polled
    pub tick: Duration,

    /// How often reception statistics are logged
    pub stats_interval: Duration,
}

impl Default for PlayoutConfig {
    fn default() -> Self {
        // ---
        Self {
            tick: Duration::from_millis(10),
            stats_interval: Duration::from_secs(5),
        }
    }
}

/// Outcome of a playout run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayoutSummary {
    pub frames_played: u64,
    pub bytes_played: u64,
}

/// Pulls buffered audio from `session` until `run_for` elapses (or
/// forever) and hands each payload to `recorder`.
///
/// Ends early, without error, once the session is closed.
///
/// # Errors
///
/// Returns error if the recorder fails to write.
pub async fn playout_loop(
    session: &Session,
    mut recorder: Option<&mut WavRecorder>,
    config: &PlayoutConfig,
    run_for: Option<Duration>,
) -> Result<PlayoutSummary> {
    // ---
    let started = Instant::now();
    let mut ticker = interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_report = started;
    let mut summary = PlayoutSummary::default();

    loop {
        ticker.tick().await;

        if session.is_closed() {
            info!("Session for friend {} closed; stopping playout", session.friend_id());
            break;
        }
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        while let Some(payload) = session.get_buffered_audio() {
            summary.frames_played += 1;
            summary.bytes_played += payload.len() as u64;
            if let Some(recorder) = recorder.as_deref_mut() {
                recorder.write_pcm(&payload)?;
            }
        }

        if last_report.elapsed() >= config.stats_interval {
            last_report = Instant::now();
            report(session, &summary);
        }
    }

    report(session, &summary);
    Ok(summary)
}

fn report(session: &Session, summary: &PlayoutSummary) {
    // ---
    if let Some(rx) = session.receive_stats() {
        rx.log(session.remote_addr());
    }
    if let Some(status) = session.buffer_status() {
        debug!(
            "Jitter buffer: {}/{} packets",
            status.buffered_packets, status.max_capacity
        );
    }
    let stats = session.statistics();
    info!(
        "Played {} frames ({} bytes); session received {} packets, {} bytes",
        summary.frames_played, summary.bytes_played, stats.packets_received, stats.bytes_received
    );
}
