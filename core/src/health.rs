//! `GET /health`: status, version, connection counts, uptime, and process
//! memory usage. Exempt from the `AuthorityGate`, eligible for the response
//! cache (30s TTL).

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::collections::HashMap;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MemoryStats {
    /// Resident set size, in bytes. `0` where the platform doesn't expose
    /// `/proc/self/statm` (anything non-Linux); reported rather than omitted
    /// so the field shape stays stable across platforms.
    pub rss_bytes: u64,
    pub cache_entries: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Currently checked-out connection count, keyed by pool name
    /// (`primary`, `secondary`).
    pub connections: HashMap<String, u64>,
    pub uptime: u64,
    pub memory: MemoryStats,
}

/// Resident set size of this process, read from `/proc/self/statm` (Linux
/// only). Returns `0` rather than an error on any platform or parse failure —
/// this field is diagnostic, not load-bearing.
fn rss_bytes() -> u64 {
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return 0;
    };
    let page_size = 4096u64;
    statm
        .split_whitespace()
        .nth(1)
        .and_then(|pages| pages.parse::<u64>().ok())
        .map(|pages| pages * page_size)
        .unwrap_or(0)
}

/// Always 200: a live process is healthy by definition. Pool exhaustion or a
/// downed backend surfaces per-request via `PoolExhausted`/`Transport`, not here.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state
        .pool
        .stats()
        .into_iter()
        .map(|(name, stats)| (name, stats.active_conns))
        .collect();

    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections,
        uptime: state.uptime_secs(),
        memory: MemoryStats {
            rss_bytes: rss_bytes(),
            cache_entries: state.cache.size(),
        },
    };

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes_expected_shape() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            connections: HashMap::new(),
            uptime: 42,
            memory: MemoryStats { rss_bytes: 0, cache_entries: 0 },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["uptime"], 42);
        assert_eq!(json["memory"]["cache_entries"], 0);
    }

    #[test]
    fn rss_bytes_never_panics() {
        let _ = rss_bytes();
    }
}
