//! Observability shared by the media core and both binaries (metrics + tracing).

mod metrics;
mod tracing;

pub use metrics::{MetricsContext, MetricsServerConfig};
pub use tracing::init_tracing;
