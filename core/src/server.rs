//! HTTP server: router assembly (the ordered middleware chain the front door
//! runs in) and graceful shutdown, via a `Server::new(cfg).serve(router)`
//! shape.

use axum::{
    body::Body,
    extract::Request,
    middleware::{from_fn, from_fn_with_state},
    response::Response,
    routing::{get, post},
    Router,
};
use http::HeaderValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    cache::run_sweeper,
    config::Config,
    error::Result,
    handlers::{command_handler, metrics_handler, pipeline_handler, transaction_handler},
    health::health,
    middleware::{
        cache_layer, metrics_layer, request_id_layer, request_id_propagation_layer, require_tenant,
        sensitive_headers_layer,
    },
    state::AppState,
};

/// Stamps the keep-alive and HTTP/2 hint headers the front door adds ahead of
/// everything else: a `Connection: keep-alive` hint for HTTP/1.1 peers, and a
/// `Link: rel=preload` nudge from `/health` toward `/metrics` for HTTP/2
/// peers capable of acting on it.
async fn connection_hints_layer(request: Request<Body>, next: axum::middleware::Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    response
        .headers_mut()
        .insert(http::header::CONNECTION, HeaderValue::from_static("keep-alive"));

    if path == "/health" {
        response
            .headers_mut()
            .insert("link", HeaderValue::from_static("</metrics>; rel=preload"));
    }

    response
}

/// Builds the full router: `/v1/*` behind the authority gate, `/health` and
/// `/metrics` exempt from it.
///
/// Layer calls compose so that the *last* `.layer()` in the whole chain
/// (including the ambient layers [`Server::serve`] adds afterwards) ends up
/// outermost — it sees every request first and every response last, after
/// every inner layer has already touched it. `cache_layer` is added here,
/// before `Server::serve` adds `CompressionLayer`, so compression ends up
/// wrapping the cache: the cache always captures and stores *uncompressed*
/// bytes, and compression is the last thing to touch a response on its way
/// out, whether it came from the handler or a cache hit. `metrics_layer`
/// itself is *not* added here — see `Server::serve`, which adds it as the
/// outermost layer of all so it wraps both the cache and compression and
/// observes every request's final, post-compression status code.
pub fn app(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/command", post(command_handler))
        .route("/pipeline", post(pipeline_handler))
        .route("/transaction", post(transaction_handler))
        .layer(from_fn_with_state(state.clone(), require_tenant));

    Router::new()
        .nest("/v1", v1)
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(from_fn_with_state(state.clone(), cache_layer))
        .layer(CorsLayer::permissive())
        .layer(from_fn(connection_hints_layer))
        .with_state(state)
}

/// Owns the bound-listener lifecycle.
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Wraps `app` in the remaining ambient tower-http layers (compression,
    /// timeout, body limit, tracing, request tracking, panic recovery) plus
    /// the metrics layer, spawns the cache sweeper, and serves until a
    /// shutdown signal arrives.
    ///
    /// `metrics_layer` is added last here, which makes it the outermost layer
    /// of the whole chain — outer even to `cache_layer` and
    /// `CompressionLayer`, both added inside [`app`]. That matters: a
    /// middleware added later always wraps everything added before it, so
    /// the *last* `.layer()` call in the overall chain sees a request first
    /// and a response last. Placing `metrics_layer` last means it observes
    /// every response only after compression and the cache have already
    /// done their work — including on a cache hit, which never reaches the
    /// handler at all — so request counters always reflect the real,
    /// final, post-compression status code.
    pub async fn serve(self, app: Router, state: AppState) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        tracing::info!(%addr, "starting redis-gate");

        let cache = state.cache.clone();
        let body_limit = 16 * 1024 * 1024;
        let app = app
            .layer(CompressionLayer::new())
            .layer(TimeoutLayer::with_status_code(
                http::StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(self.config.server.read_timeout_secs),
            ))
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(false))
                    .on_response(DefaultOnResponse::new()),
            )
            .layer(sensitive_headers_layer())
            .layer(request_id_propagation_layer())
            .layer(request_id_layer())
            .layer(CatchPanicLayer::new())
            .layer(from_fn_with_state(state, metrics_layer));

        let sweeper = tokio::spawn(run_sweeper(cache, Duration::from_secs(30)));

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.config.server.shutdown_timeout_secs))
            .await?;

        sweeper.abort();
        tracing::info!("server shutdown complete");
        Ok(())
    }
}

/// Waits for SIGINT or SIGTERM. The shutdown-timeout budget itself is
/// enforced by axum's graceful-shutdown machinery, not by this function.
async fn shutdown_signal(shutdown_timeout_secs: u64) {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }

    tracing::info!(shutdown_timeout_secs, "draining in-flight requests");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_exposes_its_config() {
        let config = Config::default();
        let server = Server::new(config.clone());
        assert_eq!(server.config().server.port, config.server.port);
    }
}
