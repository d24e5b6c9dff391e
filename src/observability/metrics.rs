//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gate metrics (requests, tokens, streams, bytes)
//! - Expose a Prometheus-compatible endpoint when enabled
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by method, route, status
//! - `gate_request_duration_seconds` (histogram): time to response headers
//! - `gate_tokens_issued_total` (counter)
//! - `gate_token_rejections_total` (counter): by reason
//! - `gate_tokens_swept_total` (counter)
//! - `gate_active_streams` (gauge): live sessions
//! - `gate_transfers_total` (counter): by outcome (completed/aborted)
//! - `gate_bytes_sent_total` (counter)
//! - `gate_capacity_rejections_total` (counter)
//! - `gate_access_denied_total` (counter): traversal attempts
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_all();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder");
        }
    }
}

fn describe_all() {
    describe_counter!("gate_requests_total", "HTTP requests handled");
    describe_histogram!(
        "gate_request_duration_seconds",
        "Time from request to response headers"
    );
    describe_counter!("gate_tokens_issued_total", "Access tokens issued");
    describe_counter!("gate_token_rejections_total", "Token verifications that failed");
    describe_counter!("gate_tokens_swept_total", "Expired tokens removed by the sweeper");
    describe_gauge!("gate_active_streams", "In-flight transfers");
    describe_counter!("gate_transfers_total", "Finished transfers by outcome");
    describe_counter!("gate_bytes_sent_total", "Resource bytes streamed");
    describe_counter!(
        "gate_capacity_rejections_total",
        "Transfers refused at the concurrency ceiling"
    );
    describe_counter!("gate_access_denied_total", "Requests that tried to leave the content root");
}

/// Record a completed HTTP request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let route = route.to_string();
    counter!(
        "gate_requests_total",
        "method" => method.to_string(),
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gate_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_token_issued() {
    counter!("gate_tokens_issued_total").increment(1);
}

pub fn record_token_rejected(reason: &'static str) {
    counter!("gate_token_rejections_total", "reason" => reason).increment(1);
}

pub fn record_tokens_swept(count: usize) {
    counter!("gate_tokens_swept_total").increment(count as u64);
}

pub fn set_active_streams(count: usize) {
    gauge!("gate_active_streams").set(count as f64);
}

pub fn record_transfer(outcome: &'static str, bytes: u64) {
    counter!("gate_transfers_total", "outcome" => outcome).increment(1);
    counter!("gate_bytes_sent_total").increment(bytes);
}

pub fn record_capacity_rejection() {
    counter!("gate_capacity_rejections_total").increment(1);
}

pub fn record_access_denied() {
    counter!("gate_access_denied_total").increment(1);
}

/// Route-level middleware recording request count and latency.
///
/// Must be attached with `route_layer` so the matched route template is known.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, response.status().as_u16(), &route, start);
    response
}
