//! HTTP handlers: decode the JSON envelope, consult the
//! [`AuthorityGate`], dispatch to the matching executor, and wrap the result in
//! a `200 OK` JSON response. Redis-level errors stay in-band — only decode and
//! authorization failures become non-200 responses.

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Instant;

use crate::error::Error;
use crate::executor::{execute_command, execute_pipeline, execute_transaction};
use crate::metrics::StatusClass;
use crate::models::{CommandRequest, PipelineRequest, TransactionRequest};
use crate::state::AppState;
use crate::tenant::{AuthorityGate, Tenant};

fn decode_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| Error::Decode(e.to_string()))
}

pub async fn command_handler(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    body: Bytes,
) -> Result<Response, Error> {
    let start = Instant::now();
    let req: CommandRequest = decode_body(&body)?;

    AuthorityGate::check_command(&tenant, &req.normalized_command()).map_err(Error::Unauthorized)?;
    AuthorityGate::check_db(&tenant, req.db).map_err(Error::Unauthorized)?;

    let response = execute_command(&state.pool, &state.selector, state.metrics.as_ref(), &req).await;
    state.metrics.record_request("POST", "/v1/command", StatusClass::Success, &tenant.id, start.elapsed());
    Ok(Json(response).into_response())
}

pub async fn pipeline_handler(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    body: Bytes,
) -> Result<Response, Error> {
    let start = Instant::now();
    let req: PipelineRequest = decode_body(&body)?;

    AuthorityGate::check_db(&tenant, req.db).map_err(Error::Unauthorized)?;
    for command in &req.commands {
        AuthorityGate::check_command(&tenant, &command.normalized_command()).map_err(Error::Unauthorized)?;
    }

    let response = execute_pipeline(&state.pool, &state.selector, state.metrics.as_ref(), &req).await;
    state.metrics.record_request("POST", "/v1/pipeline", StatusClass::Success, &tenant.id, start.elapsed());
    Ok(Json(response).into_response())
}

pub async fn transaction_handler(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    body: Bytes,
) -> Result<Response, Error> {
    let start = Instant::now();
    let req: TransactionRequest = decode_body(&body)?;

    AuthorityGate::check_db(&tenant, req.db).map_err(Error::Unauthorized)?;
    for command in &req.commands {
        AuthorityGate::check_command(&tenant, &command.normalized_command()).map_err(Error::Unauthorized)?;
    }

    let response = execute_transaction(&state.pool, &state.selector, state.metrics.as_ref(), &req).await?;
    state.metrics.record_request("POST", "/v1/transaction", StatusClass::Success, &tenant.id, start.elapsed());
    Ok(Json(response).into_response())
}

/// `GET /metrics`: delegated straight to the configured sink's text
/// exposition. Exempt from the authority gate, eligible for the response
/// cache (10s TTL).
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    (StatusCode::OK, state.metrics.render_text()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_body_reports_decode_error_on_malformed_json() {
        let body = Bytes::from_static(b"not json");
        let result: Result<CommandRequest, Error> = decode_body(&body);
        assert!(result.is_err());
    }

    #[test]
    fn decode_body_parses_valid_command_request() {
        let body = Bytes::from_static(br#"{"command":"GET","args":["k"]}"#);
        let req: CommandRequest = decode_body(&body).unwrap();
        assert_eq!(req.normalized_command(), "GET");
    }
}
