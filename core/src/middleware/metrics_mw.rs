//! Metrics-recorder middleware: observes method, route
//! template, bucketed status class, and tenant id for every request.

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics::StatusClass;
use crate::state::AppState;

/// Records request metrics for every route this layer wraps. `/v1/*` handlers
/// resolve their tenant only after this layer has already run (the authority
/// gate sits further in, per its ordering) and record their own
/// `record_request` call with the real tenant id once known — so this layer
/// skips `/v1/*` to avoid double-counting and only covers the always-anonymous
/// routes (`/health`, `/metrics`, anything unmatched).
pub async fn metrics_layer(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    if path.starts_with("/v1/") {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    state.metrics.record_request(
        &method,
        &route,
        StatusClass::from_status(response.status().as_u16()),
        "anonymous",
        elapsed,
    );

    response
}
