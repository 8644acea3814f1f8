//! `MetricsSink`: an abstract observation surface so the core carries no
//! compile-time dependency on a specific metrics backend, plus a default
//! in-process implementation (atomics/`dashmap`-backed counters) so `/health` and
//! a minimal `/metrics` endpoint work standalone even when no external exporter
//! is wired in.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::pool::PoolStatsSnapshot;

/// Bucketed HTTP status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status / 100 {
            1 => StatusClass::Informational,
            2 => StatusClass::Success,
            3 => StatusClass::Redirection,
            4 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusClass::Informational => "1xx",
            StatusClass::Success => "2xx",
            StatusClass::Redirection => "3xx",
            StatusClass::ClientError => "4xx",
            StatusClass::ServerError => "5xx",
        }
    }
}

/// Observation surface the HTTP front door and the executors record into.
/// External implementations (e.g. a Prometheus/OTel exporter) implement this
/// trait instead of the default; see `InProcessMetrics` below for the one
/// shipped with the core.
pub trait MetricsSink: Send + Sync {
    fn record_request(&self, method: &str, route: &str, status_class: StatusClass, tenant_id: &str, latency: Duration);
    fn record_command(&self, command: &str, backend: &str, outcome: CommandOutcome, latency: Duration);
    fn record_pool_stats(&self, pool_name: &str, stats: PoolStatsSnapshot);
    /// Renders the current counters in a minimal Prometheus-compatible text
    /// exposition, for `GET /metrics` when no external exporter is configured.
    fn render_text(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandOutcome {
    Ok,
    /// A server-side Redis error reply, categorized by known substrings (`WRONGTYPE`, `NOAUTH`, ...).
    RedisError(&'static str),
    Transport,
}

#[derive(Default)]
struct Counter(AtomicU64);

impl Counter {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Atomics/`dashmap`-keyed default sink. Latencies are tracked as a running sum
/// plus count (cheap, lock-free) rather than a full histogram — sufficient for
/// the text exposition this sink renders; a real exporter implementing
/// [`MetricsSink`] is expected to do proper bucketing.
#[derive(Default)]
pub struct InProcessMetrics {
    requests_total: DashMap<(String, String, &'static str), Counter>,
    request_latency_ms_sum: DashMap<(String, String), AtomicU64>,
    commands_total: DashMap<(String, String, &'static str), Counter>,
    command_errors_total: DashMap<(String, &'static str), Counter>,
    pool_stats: DashMap<String, PoolStatsSnapshot>,
}

impl InProcessMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for InProcessMetrics {
    fn record_request(&self, method: &str, route: &str, status_class: StatusClass, tenant_id: &str, latency: Duration) {
        let key = (method.to_string(), route.to_string(), status_class.label());
        self.requests_total.entry(key).or_default().inc();
        self.request_latency_ms_sum
            .entry((method.to_string(), route.to_string()))
            .or_default()
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        tracing::debug!(method, route, status = status_class.label(), tenant_id, latency_ms = latency.as_millis() as u64, "request observed");
    }

    fn record_command(&self, command: &str, backend: &str, outcome: CommandOutcome, latency: Duration) {
        let outcome_label = match outcome {
            CommandOutcome::Ok => "ok",
            CommandOutcome::RedisError(_) => "redis_error",
            CommandOutcome::Transport => "transport_error",
        };
        self.commands_total
            .entry((command.to_string(), backend.to_string(), outcome_label))
            .or_default()
            .inc();
        if let CommandOutcome::RedisError(category) = outcome {
            self.command_errors_total
                .entry((command.to_string(), category))
                .or_default()
                .inc();
        }
        tracing::debug!(command, backend, outcome = outcome_label, latency_ms = latency.as_millis() as u64, "command observed");
    }

    fn record_pool_stats(&self, pool_name: &str, stats: PoolStatsSnapshot) {
        self.pool_stats.insert(pool_name.to_string(), stats);
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("# HELP redis_gate_requests_total HTTP requests by method, route, status class\n");
        out.push_str("# TYPE redis_gate_requests_total counter\n");
        for entry in self.requests_total.iter() {
            let (method, route, class) = entry.key();
            out.push_str(&format!(
                "redis_gate_requests_total{{method=\"{method}\",route=\"{route}\",status=\"{class}\"}} {}\n",
                entry.value().get()
            ));
        }
        out.push_str("# HELP redis_gate_commands_total Redis commands by name, backend, outcome\n");
        out.push_str("# TYPE redis_gate_commands_total counter\n");
        for entry in self.commands_total.iter() {
            let (command, backend, outcome) = entry.key();
            out.push_str(&format!(
                "redis_gate_commands_total{{command=\"{command}\",backend=\"{backend}\",outcome=\"{outcome}\"}} {}\n",
                entry.value().get()
            ));
        }
        out.push_str("# HELP redis_gate_pool_active Currently checked-out connections per pool\n");
        out.push_str("# TYPE redis_gate_pool_active gauge\n");
        for entry in self.pool_stats.iter() {
            out.push_str(&format!(
                "redis_gate_pool_active{{pool=\"{}\"}} {}\n",
                entry.key(),
                entry.value().active_conns
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_class_buckets() {
        assert_eq!(StatusClass::from_status(200).label(), "2xx");
        assert_eq!(StatusClass::from_status(404).label(), "4xx");
        assert_eq!(StatusClass::from_status(500).label(), "5xx");
    }

    #[test]
    fn records_are_observable_under_concurrent_use() {
        let metrics = InProcessMetrics::new();
        metrics.record_request("GET", "/health", StatusClass::Success, "default", Duration::from_millis(1));
        metrics.record_command("GET", "primary", CommandOutcome::Ok, Duration::from_millis(1));
        let text = metrics.render_text();
        assert!(text.contains("redis_gate_requests_total"));
        assert!(text.contains("redis_gate_commands_total"));
    }
}
