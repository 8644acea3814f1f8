//! # redis-gate-core
//!
//! An HTTP-fronted Redis proxy: connection pooling, pipeline and transaction
//! batching, response caching, and per-tenant command/database authorization,
//! all reachable over a small JSON API instead of the native Redis protocol.
//!
//! ## Example
//!
//! ```rust,no_run
//! use redis_gate_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let metrics: Arc<dyn MetricsSink> = Arc::new(InProcessMetrics::default());
//!     let state = AppState::new(config.clone(), metrics);
//!     state.warm_pools().await;
//!
//!     let app = app(state.clone());
//!
//!     Server::new(config).serve(app, state).await
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod pool;
pub mod selector;
pub mod server;
pub mod state;
pub mod tenant;
pub mod value;

/// Convenience re-exports for the binary crate and integration tests.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::health::health;
    pub use crate::metrics::{InProcessMetrics, MetricsSink};
    pub use crate::observability::init_tracing;
    pub use crate::server::{app, Server};
    pub use crate::state::AppState;
}
