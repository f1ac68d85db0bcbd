//! Metrics collection and exposition.
//!
//! # Metrics
//! - `crushd_requests_total` (counter): requests by endpoint, status
//! - `crushd_request_duration_seconds` (histogram): latency by endpoint
//! - `crushd_clusters` (gauge): configured clusters
//! - `crushd_refresh_total` (counter): snapshot refreshes by outcome
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// `endpoint` is the matched route template, e.g. `/api/v2/cluster/{fsid}`.
pub fn record_request(endpoint: &str, status: u16, start: Instant) {
    counter!(
        "crushd_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("crushd_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cluster_count(count: usize) {
    gauge!("crushd_clusters").set(count as f64);
}

pub fn record_refresh(outcome: &'static str) {
    counter!("crushd_refresh_total", "outcome" => outcome).increment(1);
}
