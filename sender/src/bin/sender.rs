//! Peer RTP sender - CLI binary.
//!
//! Reads a WAV file and streams it as 20ms PCM frames over RTP/UDP to one
//! peer, optionally alongside a synthetic VP8-packetized video feed.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use media::vp8::{Vp8CodecFactory, DEFAULT_MAX_PAYLOAD_SIZE};
use media::{SessionConfig, TransportIntegration};
use peer_rtp_common::{
    init_tracing, ColorWhen, MetricsContext, MetricsServerConfig, Providers, UdpTransport,
};
use sender::{read_wav, stream_audio, stream_video, TestPattern};

/// Peer RTP Sender - Stream audio (and test video) to a peer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    // ---
    /// Input audio file (WAV format)
    #[arg(short, long)]
    input: String,

    /// Remote peer address (IP:port)
    #[arg(short, long, default_value = "127.0.0.1:5004")]
    remote: SocketAddr,

    /// Local bind address
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// Friend ID assigned to the remote peer
    #[arg(long, default_value_t = 1)]
    friend_id: u32,

    /// Packet transmission interval in milliseconds
    #[arg(short = 't', long, default_value = "20")]
    interval_ms: u64,

    /// Replay input audio continuously (default). Use `--no-loop` to play once and exit.
    #[arg(long = "no-loop", default_value_t = true, action = clap::ArgAction::SetFalse)]
    loop_audio: bool,

    /// Synthetic video frame rate (0 disables video)
    #[arg(long, default_value_t = 0)]
    video_fps: u32,

    /// Synthetic video frame size in bytes
    #[arg(long, default_value_t = 4000)]
    video_frame_size: usize,

    /// Maximum RTP payload per video fragment
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD_SIZE)]
    video_max_payload: usize,

    /// Prometheus metrics bind address (serves `GET /metrics`).
    #[arg(long, default_value = "127.0.0.1:9100")]
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

    info!("Starting peer RTP sender v{VERSION}");
    info!("Input file: {}", args.input);
    info!("Remote peer: {} (friend {})", args.remote, args.friend_id);
    info!("Transmission interval: {}ms", args.interval_ms);
    info!("Loop audio: {}", args.loop_audio);
    info!("Metrics bind: {}", args.metrics_bind);

    let metrics = MetricsContext::new("sender")?;
    let _metrics_task = metrics.spawn_metrics_server(MetricsServerConfig::new(args.metrics_bind));

    let input_path = args.input.clone();
    let clip = tokio::task::spawn_blocking(move || read_wav(input_path))
        .await
        .context("audio reading task failed")??;
    info!(
        "Loaded {:.2}s of audio ({} frames)",
        clip.duration_secs(),
        clip.frame_count()
    );

    let transport = Arc::new(UdpTransport::bind(args.bind).await?);
    let providers = Providers::system();
    let video_codecs = Arc::new(Vp8CodecFactory::new(
        args.video_max_payload,
        Arc::clone(&providers.ssrc),
    ));
    let integration = TransportIntegration::new(
        transport.clone(),
        video_codecs,
        providers,
        SessionConfig::default(),
        Some(metrics.clone()),
    );

    // Inbound media from the peer is accepted but only logged
    let receive_task = {
        let transport = Arc::clone(&transport);
        tokio::spawn(async move { transport.run().await })
    };

    let session = integration
        .create_session(args.friend_id, args.remote)
        .context("failed to create session")?;
    info!(
        "Audio SSRC: 0x{:08X}",
        session.audio_ssrc().unwrap_or_default()
    );

    let frame_interval = Duration::from_millis(args.interval_ms);
    let audio = stream_audio(&clip, &session, frame_interval, args.loop_audio);

    if args.video_fps > 0 {
        let mut pattern = TestPattern::new(args.video_frame_size);
        let video = stream_video(&mut pattern, &session, args.video_fps, None);
        tokio::select! {
            result = audio => { result?; }
            result = video => { result?; }
        }
    } else {
        audio.await?;
    }

    let stats = session.statistics();
    info!(
        "Transmission complete: {} packets, {} bytes ({:.1} pkt/s)",
        stats.packets_sent,
        stats.bytes_sent,
        stats.packets_per_second_sent(std::time::Instant::now())
    );

    integration.close()?;
    receive_task.abort();
    if let Ok(Err(e)) = receive_task.await {
        warn!("Receive loop ended with error: {:#}", e);
    }

    Ok(())
}
