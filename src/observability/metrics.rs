//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_router_requests_total` (counter): requests by method, status, outcome
//! - `edge_router_request_duration_seconds` (histogram): latency by outcome
//!
//! Outcomes are `routed` (redirect, proxy or error response from the engine)
//! and `pass_through` (no route matched).

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record one finished request.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "edge_router_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    metrics::histogram!("edge_router_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}
