//! Error types and HTTP response conversion.
//!
//! Mirrors the error kinds enumerated in the design: decode failures, authentication/
//! authorization denials, pool exhaustion and transport faults are all HTTP-visible;
//! Redis-level command errors and watch-triggered transaction discards are not — they are
//! reported in-band inside a `200 OK` envelope by the handlers themselves.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the proxy.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed JSON request envelope.
    #[error("failed to decode request: {0}")]
    Decode(String),

    /// Missing or invalid credentials on the `Authorization` header.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Tenant denied by the authority gate (command or database not permitted).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A backend pool acquire did not complete within `pool-timeout`.
    #[error("pool exhausted: {0}")]
    PoolExhausted(String),

    /// Dial, read, write, or protocol-parse failure talking to a backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration failed to load.
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error (listener bind, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Decode(_) => "DECODE_ERROR",
            Error::Unauthenticated(_) => "UNAUTHENTICATED",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::PoolExhausted(_) => "POOL_EXHAUSTED",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Decode(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Error::Unauthorized(_) => StatusCode::FORBIDDEN,
            Error::PoolExhausted(_) | Error::Transport(_) | Error::Config(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Uniform error response body: `{error, code, details, time}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub time: f64,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "request failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "request rejected");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
            details: None,
            time: 0.0,
        };
        (status, Json(body)).into_response()
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Transport(err.to_string())
    }
}

/// Distinguishes a transport-level fault (dial/read/write/protocol-parse, or a
/// dropped/timed-out connection) from a server-side error reply. Only the
/// former taints the pooled connection; the latter is reported in-band.
pub fn is_transport_fault(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal()
}

/// Categorizes a Redis server error reply by substring, for metrics only.
pub fn categorize_redis_error(message: &str) -> &'static str {
    const KNOWN: &[&str] = &[
        "WRONGTYPE", "NOAUTH", "NOPERM", "READONLY", "OOM", "EXECABORT", "TIMEOUT",
    ];
    for kind in KNOWN {
        if message.contains(kind) {
            return kind;
        }
    }
    "other"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_maps_to_400() {
        let err = Error::Decode("bad json".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn unauthorized_maps_to_403() {
        let err = Error::Unauthorized("command not permitted".into());
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn categorize_known_substrings() {
        assert_eq!(categorize_redis_error("WRONGTYPE Operation against..."), "WRONGTYPE");
        assert_eq!(categorize_redis_error("ERR unknown command"), "other");
    }
}
