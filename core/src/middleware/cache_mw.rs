//! Response-cache middleware: wraps the downstream writer
//! for cacheable GET paths, replaying a captured response on hit and stamping
//! `X-Cache: HIT|MISS` (and `X-Cache-Age` on hit).

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::cache::{is_cacheable, ttl_for_path, CacheEntry};
use crate::fingerprint::Fingerprint;
use crate::state::AppState;

const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

pub async fn cache_layer(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();

    if !is_cacheable(&method, &path) {
        return next.run(request).await;
    }

    let query = request.uri().query().unwrap_or("").to_string();
    let authorization = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let fingerprint = Fingerprint::compute(&method, &path, &query, &authorization, b"");

    if let Some(entry) = state.cache.get(&fingerprint) {
        let age = entry.age_secs(Instant::now());
        let mut response = Response::builder()
            .status(StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK))
            .body(Body::from(entry.body.clone()))
            .expect("cached response always builds");
        *response.headers_mut() = entry.headers.clone();
        response
            .headers_mut()
            .insert("x-cache", HeaderValue::from_static("HIT"));
        response.headers_mut().insert(
            "x-cache-age",
            HeaderValue::from_str(&age.to_string()).expect("age is always valid ascii"),
        );
        return response;
    }

    let response = next.run(request).await;
    let status = response.status();
    if status != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    state.cache.set(
        fingerprint,
        CacheEntry {
            body: bytes.to_vec(),
            headers: parts.headers.clone(),
            status: parts.status.as_u16(),
            inserted_at: Instant::now(),
            ttl: ttl_for_path(&path),
        },
    );

    let mut response = Response::from_parts(parts, Body::from(bytes));
    response
        .headers_mut()
        .insert("x-cache", HeaderValue::from_static("MISS"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_cached_body_bytes_is_reasonable() {
        assert!(MAX_CACHED_BODY_BYTES >= 1024);
    }
}
