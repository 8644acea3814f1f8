//! HTTP middleware: request tracking (always on, ambient stack),
//! response caching, and the per-tenant authorization gate.

pub mod auth;
pub mod cache_mw;
pub mod metrics_mw;
pub mod request_tracking;

pub use auth::{require_tenant, Claims};
pub use cache_mw::cache_layer;
pub use metrics_mw::metrics_layer;
pub use request_tracking::{
    request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    RequestTrackingConfig, PROPAGATE_HEADERS, SENSITIVE_HEADERS,
};
