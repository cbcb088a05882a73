//! Logging setup and the request callbacks plugged into `TraceLayer`.

use axum::body::Body;
use axum::http::{Request, Response};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tracing::{info_span, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "tourly=debug,tower_http=info";

/// Installs the global subscriber; `RUST_LOG` overrides the default filter.
/// Load `.env` first so a `RUST_LOG` kept there applies.
pub fn init() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::registry()
        .with(filter(directives.as_deref()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

pub fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri().path(),
        query = ?request.uri().query(),
        request_id = request_id,
        range = ?request.headers().get("range"),
        content_length = ?request.headers().get("content-length"),
    )
}

pub fn on_response(response: &Response<Body>, latency: Duration, _span: &Span) {
    let status = response.status();
    let latency_ms = latency.as_millis();

    match status.as_u16() {
        400..=499 => tracing::warn!(status = %status, latency_ms, "request completed with client error"),
        500..=599 => tracing::error!(status = %status, latency_ms, "request completed with server error"),
        _ => tracing::info!(status = %status, latency_ms, "request completed"),
    }
}

pub fn on_failure(error: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
    tracing::error!(error = %error, latency_ms = latency.as_millis(), "request failed");
}
