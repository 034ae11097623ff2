//! Metrics collection and exposition.
//!
//! # Metrics
//! - `routekit_requests_total` (counter): requests by method, status, route
//! - `routekit_request_duration_seconds` (histogram): latency by route
//! - `routekit_rate_limited_total` (counter): rejections by route
//! - `routekit_route_table_size` (gauge): routes in the published table
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::Method;

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Methods outside the routable set share one label value.
pub fn method_label(method: &str) -> &'static str {
    method.parse::<Method>().map(|m| m.as_str()).unwrap_or("OTHER")
}

pub fn record_request(method: &str, status: u16, route: &str, start_time: Instant) {
    metrics::counter!(
        "routekit_requests_total",
        "method" => method_label(method),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    metrics::histogram!("routekit_request_duration_seconds", "route" => route.to_string())
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_rate_limited(route: &str) {
    metrics::counter!("routekit_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_route_table_size(size: usize) {
    metrics::gauge!("routekit_route_table_size").set(size as f64);
}
