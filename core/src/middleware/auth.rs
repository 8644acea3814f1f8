//! `AuthorityGate` front-door middleware: parses the `Authorization`
//! header in one of four accepted formats, resolves a [`Tenant`], and injects
//! it into the request's extensions for handlers to consult. Exempt routes
//! (`/health`, `/metrics`) never run this layer.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::state::AppState;
use crate::tenant::Tenant;

/// JWT claims this proxy trusts: `sub` carries the tenant id directly, and the
/// access-control fields mirror the registered-api-key shape so a JWT-carried
/// tenant is gated identically to one looked up from `auth.api-keys`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
    #[serde(default = "default_allowed_dbs")]
    pub allowed_dbs: Vec<u8>,
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

fn default_permissions() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_allowed_dbs() -> Vec<u8> {
    (0u8..16).collect()
}

impl Claims {
    fn into_tenant(self) -> Tenant {
        Tenant {
            id: self.sub,
            rate_limit: self.rate_limit,
            allowed_dbs: self.allowed_dbs.into_iter().collect(),
            permissions: self.permissions,
        }
    }
}

/// Constant-time byte comparison, used for the Basic-auth tenant-id check: a
/// registered tenant id must never be distinguishable from a forged one by
/// response-timing side channel.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn decode_jwt(token: &str, secret: &str) -> Result<Claims, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| Error::Unauthenticated(format!("invalid JWT: {e}")))?;
    Ok(data.claims)
}

/// Resolves the tenant behind an `Authorization` header value, per its four
/// accepted formats.
fn resolve_tenant(state: &AppState, header_value: &str) -> Result<Tenant, Error> {
    if let Some(token) = header_value.strip_prefix("Bearer ") {
        // api-key first; only a registered key short-circuits straight to its
        // tenant. Anything else is assumed to be a JWT.
        if let Some(tenant) = state.tenants.find_by_key(token) {
            return Ok(tenant.clone());
        }
        if state.config.auth.jwt_secret.is_empty() {
            return Err(Error::Unauthenticated("no matching api key and no jwt-secret configured".into()));
        }
        let claims = decode_jwt(token, &state.config.auth.jwt_secret)?;
        return Ok(claims.into_tenant());
    }

    if let Some(encoded) = header_value.strip_prefix("Basic ") {
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|_| Error::Unauthenticated("malformed Basic credentials".into()))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| Error::Unauthenticated("malformed Basic credentials".into()))?;
        let (tenant_id, api_key) = decoded
            .split_once(':')
            .ok_or_else(|| Error::Unauthenticated("malformed Basic credentials".into()))?;

        let (registered_id, tenant) = state
            .tenants
            .find_by_key_with_id(api_key)
            .ok_or_else(|| Error::Unauthenticated("unknown api key".into()))?;

        if !constant_time_eq(registered_id.as_bytes(), tenant_id.as_bytes()) {
            return Err(Error::Unauthenticated("tenant id does not match api key".into()));
        }
        return Ok(tenant.clone());
    }

    // Raw legacy api-key header.
    state
        .tenants
        .find_by_key(header_value)
        .cloned()
        .ok_or_else(|| Error::Unauthenticated("unknown api key".into()))
}

/// Axum middleware entry point: attaches a [`Tenant`] to the request's
/// extensions, or rejects with 401 before the handler ever runs.
pub async fn require_tenant(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    if !state.tenants.enabled() {
        request.extensions_mut().insert(Tenant::default_tenant());
        return Ok(next.run(request).await);
    }

    let header_value = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Unauthenticated("missing Authorization header".to_string()))?
        .to_string();

    let tenant = resolve_tenant(&state, &header_value)?;
    request.extensions_mut().insert(tenant);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"tenant-1", b"tenant-1"));
        assert!(!constant_time_eq(b"tenant-1", b"tenant-2"));
        assert!(!constant_time_eq(b"short", b"longer-value"));
    }

    #[test]
    fn claims_default_to_full_access_when_unspecified() {
        let claims = Claims {
            sub: "t1".to_string(),
            exp: 0,
            permissions: default_permissions(),
            allowed_dbs: default_allowed_dbs(),
            rate_limit: None,
        };
        let tenant = claims.into_tenant();
        assert_eq!(tenant.id, "t1");
        assert!(tenant.permissions.contains(&"*".to_string()));
        assert_eq!(tenant.allowed_dbs.len(), 16);
    }
}
