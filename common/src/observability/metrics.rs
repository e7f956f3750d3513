//! Prometheus metrics (Rust `prometheus` crate).
//!
//! One `MetricsContext` is intended per process. The transport integration
//! and sessions record into it when one is supplied; each binary owns the
//! registry and decides whether to serve it.

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Configuration for the built-in Prometheus scrape endpoint.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    // ---
    /// Address to bind, e.g. `127.0.0.1:9100`.
    pub bind: SocketAddr,
}

impl MetricsServerConfig {
    // ---
    pub fn new(bind: SocketAddr) -> Self {
        // ---
        Self { bind }
    }
}

/// Prometheus metrics registry + handles.
///
/// Cloning is cheap: every handle shares the same underlying metric, so a
/// clone can be given to each session.
#[derive(Clone)]
pub struct MetricsContext {
    // ---
    registry: Registry,

    // Media counters
    pub packets_sent_total: IntCounter,
    pub packets_received_total: IntCounter,
    pub bytes_sent_total: IntCounter,
    pub bytes_received_total: IntCounter,
    pub video_frames_sent_total: IntCounter,
    pub video_frames_completed_total: IntCounter,

    // Loss and protocol counters
    pub sequence_gaps_total: IntCounter,
    pub ssrc_mismatches_total: IntCounter,
    pub packets_dropped_total: IntCounter,

    // Gauges
    pub sessions_active: IntGauge,
    pub jitter_buffer_occupancy_packets: IntGauge,

    // Latency histograms (seconds)
    pub send_seconds: Histogram,
}

impl MetricsContext {
    // ---
    /// Create a new registry and register the standard metrics.
    ///
    /// `process_name` is applied as a constant label (`process=<name>`).
    pub fn new(process_name: &str) -> Result<Self> {
        // ---
        let registry = Registry::new_custom(
            Some("peer_rtp".into()),
            Some(prometheus::labels! { "process".to_string() => process_name.to_string() }),
        )?;

        let packets_sent_total = IntCounter::with_opts(Opts::new(
            "rtp_packets_sent_total",
            "Total RTP packets handed to the transport",
        ))?;
        let packets_received_total = IntCounter::with_opts(Opts::new(
            "rtp_packets_received_total",
            "Total RTP packets accepted by a session",
        ))?;
        let bytes_sent_total = IntCounter::with_opts(Opts::new(
            "rtp_bytes_sent_total",
            "Total RTP bytes handed to the transport",
        ))?;
        let bytes_received_total = IntCounter::with_opts(Opts::new(
            "rtp_bytes_received_total",
            "Total RTP bytes accepted by a session",
        ))?;
        let video_frames_sent_total = IntCounter::with_opts(Opts::new(
            "video_frames_sent_total",
            "Total video frames fully sent",
        ))?;
        let video_frames_completed_total = IntCounter::with_opts(Opts::new(
            "video_frames_completed_total",
            "Total video frames reassembled from fragments",
        ))?;

        let sequence_gaps_total = IntCounter::with_opts(Opts::new(
            "rtp_sequence_gaps_total",
            "Total sequence-number discontinuities observed",
        ))?;
        let ssrc_mismatches_total = IntCounter::with_opts(Opts::new(
            "rtp_ssrc_mismatches_total",
            "Total packets rejected for carrying a foreign SSRC",
        ))?;
        let packets_dropped_total = IntCounter::with_opts(Opts::new(
            "rtp_packets_dropped_total",
            "Total inbound packets dropped (routing or protocol errors)",
        ))?;

        let sessions_active = IntGauge::with_opts(Opts::new(
            "sessions_active",
            "Number of open peer sessions",
        ))?;
        let jitter_buffer_occupancy_packets = IntGauge::with_opts(Opts::new(
            "jitter_buffer_occupancy_packets",
            "Jitter buffer occupancy in packets, last observed session",
        ))?;

        let send_seconds = Histogram::with_opts(HistogramOpts::new(
            "send_seconds",
            "Time spent handing one media unit to the transport (seconds)",
        ))?;

        // Register all metrics
        registry.register(Box::new(packets_sent_total.clone()))?;
        registry.register(Box::new(packets_received_total.clone()))?;
        registry.register(Box::new(bytes_sent_total.clone()))?;
        registry.register(Box::new(bytes_received_total.clone()))?;
        registry.register(Box::new(video_frames_sent_total.clone()))?;
        registry.register(Box::new(video_frames_completed_total.clone()))?;
        registry.register(Box::new(sequence_gaps_total.clone()))?;
        registry.register(Box::new(ssrc_mismatches_total.clone()))?;
        registry.register(Box::new(packets_dropped_total.clone()))?;
        registry.register(Box::new(sessions_active.clone()))?;
        registry.register(Box::new(jitter_buffer_occupancy_packets.clone()))?;
        registry.register(Box::new(send_seconds.clone()))?;

        Ok(Self {
            registry,
            packets_sent_total,
            packets_received_total,
            bytes_sent_total,
            bytes_received_total,
            video_frames_sent_total,
            video_frames_completed_total,
            sequence_gaps_total,
            ssrc_mismatches_total,
            packets_dropped_total,
            sessions_active,
            jitter_buffer_occupancy_packets,
            send_seconds,
        })
    }

    /// Gather metric families from this registry.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        // ---
        self.registry.gather()
    }

    /// Spawns a minimal HTTP server that serves `GET /metrics`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_metrics_server(&self, cfg: MetricsServerConfig) -> JoinHandle<Result<()>> {
        // ---
        let registry = Arc::new(self.registry.clone());
        tokio::spawn(async move {
            // ---
            let make_svc = make_service_fn(move |_conn| {
                let registry = Arc::clone(&registry);
                async move {
                    Ok::<_, hyper::Error>(service_fn(move |req| {
                        let registry = Arc::clone(&registry);
                        async move { handle_metrics_request(req, registry).await }
                    }))
                }
            });

            let server = Server::bind(&cfg.bind).serve(make_svc);
            server.await.map_err(|e| anyhow::anyhow!(e))?;
            Ok(())
        })
    }
}

async fn handle_metrics_request(
    req: Request<Body>,
    registry: Arc<Registry>,
) -> Result<Response<Body>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let encoder = TextEncoder::new();
            let metric_families = registry.gather();
            let mut buffer = Vec::new();

            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                let mut resp = Response::new(Body::from(format!("encode error: {e}")));
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                return Ok(resp);
            }

            let mut resp = Response::new(Body::from(buffer));
            resp.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            Ok(resp)
        }
        _ => {
            let mut resp = Response::new(Body::from("not found"));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            Ok(resp)
        }
    }
}
