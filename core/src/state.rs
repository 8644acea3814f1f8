//! Shared application state: everything a handler or middleware needs,
//! built once at startup and cloned cheaply (every field is an `Arc`) into each
//! request's extensions.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::metrics::MetricsSink;
use crate::pool::BackendPool;
use crate::selector::BackendSelector;
use crate::tenant::TenantTable;

/// Application state shared across handlers: a cheap clone-of-Arcs holding
/// the pools, cache, tenant table, and metrics sink a request needs.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: Arc<BackendPool>,
    pub selector: Arc<BackendSelector>,
    pub cache: Arc<ResponseCache>,
    pub tenants: Arc<TenantTable>,
    pub metrics: Arc<dyn MetricsSink>,
    start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, metrics: Arc<dyn MetricsSink>) -> Self {
        let pool = BackendPool::new(&config.pool, &config.redis);
        let selector = BackendSelector::new(config.redis.secondary.enabled);
        let tenants = TenantTable::from_config(&config.auth);
        let cache = ResponseCache::new(1024);

        Self {
            config: Arc::new(config),
            pool: Arc::new(pool),
            selector: Arc::new(selector),
            cache: Arc::new(cache),
            tenants: Arc::new(tenants),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Best-effort warm-up of both pools to `min-idle`, called once at startup.
    pub async fn warm_pools(&self) {
        self.pool.warm().await;
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InProcessMetrics;

    #[test]
    fn new_state_has_no_secondary_by_default() {
        let state = AppState::new(Config::default(), Arc::new(InProcessMetrics::new()));
        assert!(state.pool.secondary.is_none());
    }

    #[test]
    fn uptime_is_non_negative_immediately_after_construction() {
        let state = AppState::new(Config::default(), Arc::new(InProcessMetrics::new()));
        assert!(state.uptime_secs() < 5);
    }
}
