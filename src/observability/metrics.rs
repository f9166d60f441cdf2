//! Metrics collection and exposition.
//!
//! # Metrics
//! - `loggerd_requests_total` (counter): handled requests by status
//! - `loggerd_events_emitted_total` (counter): successful sink writes by channel, sink
//! - `loggerd_sink_errors_total` (counter): failed sink writes by channel, sink
//!
//! # Design Decisions
//! - Without an installed recorder every update is a no-op
//! - The Prometheus listener is opt-in via `observability.metrics_address`

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(status: u16) {
    counter!("loggerd_requests_total", "status" => status.to_string()).increment(1);
}

pub fn record_emitted(channel: &'static str, sink: &str) {
    counter!("loggerd_events_emitted_total", "channel" => channel, "sink" => sink.to_owned()).increment(1);
}

pub fn record_sink_error(channel: &'static str, sink: &str) {
    counter!("loggerd_sink_errors_total", "channel" => channel, "sink" => sink.to_owned()).increment(1);
}
