use std::sync::Arc;

use redis_gate_core::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config)?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "starting redis-gate"
    );

    let metrics: Arc<dyn MetricsSink> = Arc::new(InProcessMetrics::default());
    let state = AppState::new(config.clone(), metrics);
    state.warm_pools().await;

    let app = app(state.clone());

    Server::new(config).serve(app, state).await
}
