//! Peer RTP receiver - CLI binary.
//!
//! Accepts RTP audio (and VP8 video) from one peer over UDP, plays the
//! audio out of the jitter buffer into an optional WAV recording, and logs
//! reception statistics.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use media::vp8::{Vp8CodecFactory, DEFAULT_MAX_PAYLOAD_SIZE};
use media::{AudioConfig, JitterBufferConfig, SessionConfig, TransportIntegration};
use peer_rtp_common::{
    init_tracing, ColorWhen, MetricsContext, MetricsServerConfig, Providers, UdpTransport,
};
use receiver::{playout_loop, PlayoutConfig, WavRecorder};

/// Peer RTP Receiver - Receive and record a peer's audio stream
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    // ---
    /// Port to listen on
    #[arg(short, long, default_value = "5004")]
    port: u16,

    /// Address the peer sends from (IP:port)
    #[arg(long)]
    peer: SocketAddr,

    /// Friend ID assigned to the peer
    #[arg(long, default_value_t = 1)]
    friend_id: u32,

    /// Minimum spacing between jitter buffer releases in milliseconds
    ///
    /// Match the sender's frame interval for real-time playout.
    #[arg(short = 'b', long, default_value = "20")]
    buffer_ms: u64,

    /// Jitter buffer capacity in packets
    #[arg(long, default_value_t = 100)]
    buffer_capacity: usize,

    /// Record received audio to this WAV file
    #[arg(short, long)]
    output: Option<String>,

    /// Stop after this many seconds (runs until Ctrl-C otherwise)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Prometheus metrics bind address (serves `GET /metrics`).
    #[arg(long, default_value = "127.0.0.1:9200")]
    metrics_bind: SocketAddr,

    /// Coloring (auto, always, never)
    #[arg(long, default_value_t = ColorWhen::Auto)]
    color: ColorWhen,
}

/// Capture version number from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    let args = Args::parse();
    init_tracing(args.color)?;
    info!("Starting peer RTP receiver v{VERSION}");
    info!("Listening on port: {}", args.port);
    info!("Peer: {} (friend {})", args.peer, args.friend_id);
    info!("Jitter buffer: {}ms, {} packets", args.buffer_ms, args.buffer_capacity);
    info!("Metrics bind: {}", args.metrics_bind);

    let metrics = MetricsContext::new("receiver")?;
    let _metrics_task = metrics.spawn_metrics_server(MetricsServerConfig::new(args.metrics_bind));

    let transport = Arc::new(
        UdpTransport::bind(SocketAddr::from(([0, 0, 0, 0], args.port)))
            .await
            .context("failed to create receiver socket")?,
    );
    let providers = Providers::system();
    let video_codecs = Arc::new(Vp8CodecFactory::new(
        DEFAULT_MAX_PAYLOAD_SIZE,
        Arc::clone(&providers.ssrc),
    ));
    let config = SessionConfig {
        jitter_buffer: JitterBufferConfig {
            buffer_time: Duration::from_millis(args.buffer_ms),
            max_capacity: args.buffer_capacity,
        },
        ..Default::default()
    };
    let integration = TransportIntegration::new(
        transport.clone(),
        video_codecs,
        providers,
        config,
        Some(metrics.clone()),
    );

    let video_frames = Arc::new(AtomicU64::new(0));
    {
        let video_frames = Arc::clone(&video_frames);
        integration.set_video_receive_callback(move |friend, picture_id, frame: &[u8]| {
            let count = video_frames.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(
                "Video frame picture_id={} from friend {} ({} bytes, {} total)",
                picture_id,
                friend,
                frame.len(),
                count
            );
        });
    }

    let session = integration
        .create_session(args.friend_id, args.peer)
        .context("failed to create session")?;

    let receive_task = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.run().await })
    };

    let mut recorder = match &args.output {
        Some(path) => Some(WavRecorder::create(path, AudioConfig::default())?),
        None => None,
    };

    info!("Ready to receive media...");

    let run_for = args.duration_secs.map(Duration::from_secs);
    let playout_config = PlayoutConfig::default();
    let playout = playout_loop(
        &session,
        recorder.as_mut(),
        &playout_config,
        run_for,
    );

    let summary = tokio::select! {
        result = playout => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Default::default()
        }
    };

    integration.close()?;
    receive_task.abort();
    if let Ok(Err(e)) = receive_task.await {
        warn!("Receive loop ended with error: {:#}", e);
    }

    if let Some(recorder) = recorder {
        recorder.finalize()?;
    }

    let (_, _, datagrams, dropped) = transport.stats();
    info!(
        "Receiver stopped: {} frames played, {} video frames, {} datagrams ({} dropped)",
        summary.frames_played,
        video_frames.load(Ordering::Relaxed),
        datagrams,
        dropped
    );

    Ok(())
}
