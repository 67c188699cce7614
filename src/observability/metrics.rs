//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by method, status
//! - `gate_request_duration_seconds` (histogram): latency distribution
//! - `gate_rejections_total` (counter): error responses by reason
//! - `gate_rate_limiter_clients` (gauge): clients tracked by the limiter
//! - `gate_tokens_issued_total` (counter): issued tokens by scope
//!
//! Every recorder call is a no-op until [`init_metrics`] installs the
//! Prometheus exporter.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Starts the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("gate_requests_total", &labels).increment(1);
    histogram!("gate_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_rejection(reason: &'static str) {
    counter!("gate_rejections_total", "reason" => reason).increment(1);
}

pub fn record_token_issued(scope: &'static str) {
    counter!("gate_tokens_issued_total", "scope" => scope).increment(1);
}

pub fn record_client_count(clients: usize) {
    gauge!("gate_rate_limiter_clients").set(clients as f64);
}

/// Outermost middleware: counts and times every request.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    record_request(&method, response.status().as_u16(), start);
    response
}
