//! `BackendPool`: two named Redis connection pools (primary, optional
//! secondary), each bounded by min-idle / max-idle / max-active / idle-timeout /
//! max-lifetime / pool-timeout, with blocking acquire and automatic release.
//!
//! Design decision (recorded in DESIGN.md): `max-active` bounds only connections
//! currently *checked out* (a `tokio::sync::Semaphore` of that size), while
//! `max-idle` independently bounds the idle stack. `current-active ≤ max-active`
//! and `|idle-set| ≤ max-idle` are two separate bounds, not one combined
//! ceiling, and this split lets idle connections survive without holding a
//! checkout slot.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use redis::aio::MultiplexedConnection;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{PoolConfig, RedisTarget};
use crate::error::{Error, Result};

/// A live Redis-protocol connection plus the bookkeeping the pool and the
/// executors need: creation/last-use timestamps (for idle-timeout / max-lifetime)
/// and the database currently `SELECT`ed on it.
pub struct BackendConnection {
    conn: MultiplexedConnection,
    created_at: Instant,
    last_used_at: Instant,
    current_db: i64,
}

impl BackendConnection {
    fn new(conn: MultiplexedConnection, db: i64) -> Self {
        let now = Instant::now();
        Self {
            conn,
            created_at: now,
            last_used_at: now,
            current_db: db,
        }
    }

    /// Issues `SELECT db` only if the connection isn't already pinned to it.
    pub async fn select_db(&mut self, db: i64) -> Result<()> {
        if self.current_db == db {
            return Ok(());
        }
        redis::cmd("SELECT")
            .arg(db)
            .query_async::<()>(&mut self.conn)
            .await?;
        self.current_db = db;
        Ok(())
    }

    /// Issues a command by name with string-ish args and returns the raw reply,
    /// or the raw `redis::RedisError` so callers can distinguish a server-side
    /// error reply (not tainting) from a genuine transport fault (tainting).
    pub async fn execute(
        &mut self,
        command: &str,
        args: &[String],
    ) -> std::result::Result<redis::Value, redis::RedisError> {
        let mut cmd = redis::cmd(command);
        for arg in args {
            cmd.arg(arg);
        }
        cmd.query_async::<redis::Value>(&mut self.conn).await
    }

    /// Issues a pre-built command (used for `WATCH`/`MULTI` where the executor
    /// needs to retain control over exactly what is sent and a straight error
    /// reply, rather than a per-entry one, is the correct outcome).
    pub async fn execute_cmd(&mut self, cmd: &redis::Cmd) -> std::result::Result<redis::Value, redis::RedisError> {
        cmd.query_async::<redis::Value>(&mut self.conn).await
    }

    /// Issues a single pre-built command through the pipeline codec and
    /// returns its raw reply with no error-extracting conversion applied.
    /// Used for `EXEC`: unlike [`Self::execute_cmd`], this never turns a
    /// per-entry `Value::ServerError` nested inside the reply into an `Err`,
    /// so a committed transaction whose queued commands include a Redis-level
    /// error still comes back as `Ok` with that entry intact. Only a genuine
    /// transport fault surfaces here as `Err`.
    pub async fn execute_single_raw(&mut self, cmd: redis::Cmd) -> std::result::Result<redis::Value, redis::RedisError> {
        let mut pipe = redis::pipe();
        pipe.add_command(cmd);
        let mut values = pipe.query_async::<Vec<redis::Value>>(&mut self.conn).await?;
        Ok(values.pop().unwrap_or(redis::Value::Nil))
    }

    /// Flushes a whole pipeline and collects replies in order.
    /// Requesting `Vec<redis::Value>` as the target type is deliberate: `Value`'s
    /// own `FromRedisValue` impl is an infallible identity conversion, so a
    /// per-command error reply comes back as a `Value::ServerError` entry in the
    /// vector instead of short-circuiting the whole batch into `Err`. Only a
    /// genuine transport fault (connection dropped mid-flush, etc.) surfaces here
    /// as `Err`.
    pub async fn execute_pipeline(
        &mut self,
        pipe: &redis::Pipeline,
    ) -> std::result::Result<Vec<redis::Value>, redis::RedisError> {
        pipe.query_async::<Vec<redis::Value>>(&mut self.conn).await
    }

    pub fn current_db(&self) -> i64 {
        self.current_db
    }
}

#[derive(Debug, Default, Serialize, Clone, Copy)]
pub struct PoolStatsSnapshot {
    pub total_conns: u64,
    pub idle_conns: u64,
    pub active_conns: u64,
    pub stale_conns: u64,
    pub hits: u64,
    pub misses: u64,
    pub timeouts: u64,
}

#[derive(Default)]
struct PoolCounters {
    total_conns: AtomicU64,
    stale_conns: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    timeouts: AtomicU64,
}

/// One named connection pool (`primary` or `secondary`).
pub struct Pool {
    name: String,
    cfg: PoolConfig,
    target: RedisTarget,
    idle: Mutex<VecDeque<BackendConnection>>,
    semaphore: Arc<Semaphore>,
    counters: PoolCounters,
}

impl Pool {
    pub fn new(name: impl Into<String>, cfg: PoolConfig, target: RedisTarget) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            semaphore: Arc::new(Semaphore::new(cfg.max_active)),
            idle: Mutex::new(VecDeque::new()),
            target,
            cfg,
            counters: PoolCounters::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Best-effort warm-up to `min-idle`, run once at startup. Failures are
    /// logged, not propagated — a cold pool still serves traffic, just with a
    /// miss on the first few acquires.
    pub async fn warm(self: &Arc<Self>) {
        for _ in 0..self.cfg.min_idle {
            match self.dial().await {
                Ok(conn) => {
                    self.counters.total_conns.fetch_add(1, Ordering::Relaxed);
                    self.idle.lock().unwrap().push_back(conn);
                }
                Err(err) => {
                    tracing::warn!(pool = %self.name, error = %err, "pool warm-up dial failed");
                    break;
                }
            }
        }
    }

    /// Blocking acquire bounded by `pool-timeout`.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let permit = match tokio::time::timeout(
            Duration::from_secs(self.cfg.pool_timeout_secs),
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(Error::PoolExhausted(format!(
                    "pool {} closed unexpectedly",
                    self.name
                )))
            }
            Err(_) => {
                self.counters.timeouts.fetch_add(1, Ordering::Relaxed);
                return Err(Error::PoolExhausted(format!(
                    "acquire on pool {} did not complete within {}s",
                    self.name, self.cfg.pool_timeout_secs
                )));
            }
        };

        loop {
            let candidate = self.idle.lock().unwrap().pop_front();
            let Some(conn) = candidate else { break };

            let now = Instant::now();
            let too_old = conn.created_at.elapsed() > Duration::from_secs(self.cfg.max_lifetime_secs);
            let too_idle =
                now.duration_since(conn.last_used_at) > Duration::from_secs(self.cfg.idle_timeout_secs);
            if too_old || too_idle {
                self.counters.stale_conns.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(PooledConnection {
                conn: Some(conn),
                pool: Arc::clone(self),
                _permit: permit,
                tainted: false,
            });
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        let conn = self.dial().await?;
        self.counters.total_conns.fetch_add(1, Ordering::Relaxed);
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
            _permit: permit,
            tainted: false,
        })
    }

    async fn dial(&self) -> Result<BackendConnection> {
        let client = redis::Client::open(self.target.connection_url())
            .map_err(|e| Error::Transport(format!("invalid redis address for {}: {e}", self.name)))?;

        let conn = tokio::time::timeout(
            Duration::from_secs(self.target.dial_timeout_secs),
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| Error::Transport(format!("dial timeout connecting to pool {}", self.name)))??;

        Ok(BackendConnection::new(conn, self.target.db))
    }

    /// Release algorithm: tainted connections are always closed; otherwise
    /// returned to idle unless the pool is already at `max-idle`.
    fn release(&self, mut conn: BackendConnection, tainted: bool) {
        if tainted {
            tracing::debug!(pool = %self.name, "dropping tainted connection");
            return;
        }
        let mut idle = self.idle.lock().unwrap();
        if idle.len() >= self.cfg.max_idle {
            return;
        }
        conn.last_used_at = Instant::now();
        idle.push_back(conn);
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        let idle_conns = self.idle.lock().unwrap().len() as u64;
        let active_conns = (self.cfg.max_active - self.semaphore.available_permits()) as u64;
        PoolStatsSnapshot {
            total_conns: self.counters.total_conns.load(Ordering::Relaxed),
            idle_conns,
            active_conns,
            stale_conns: self.counters.stale_conns.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// A checked-out connection. Dropping it (whatever the control-flow exit path —
/// success, error, or cancellation) is the sole release mechanism: the guard
/// returns the connection to idle, or closes it if `taint()` was called first.
pub struct PooledConnection {
    conn: Option<BackendConnection>,
    pool: Arc<Pool>,
    _permit: OwnedSemaphorePermit,
    tainted: bool,
}

impl PooledConnection {
    /// Marks the connection for disposal rather than reuse. Any transport-level
    /// fault or cancellation mid-round-trip must call this before the guard drops.
    pub fn taint(&mut self) {
        self.tainted = true;
    }

    pub fn get_mut(&mut self) -> &mut BackendConnection {
        self.conn.as_mut().expect("connection taken before drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.tainted);
        }
    }
}

/// Owns the primary and optional secondary pools.
pub struct BackendPool {
    pub primary: Arc<Pool>,
    pub secondary: Option<Arc<Pool>>,
}

impl BackendPool {
    pub fn new(cfg: &PoolConfig, redis: &crate::config::RedisSection) -> Self {
        let primary = Pool::new("primary", cfg.clone(), redis.primary.clone());
        let secondary = if redis.secondary.enabled {
            Some(Pool::new("secondary", cfg.clone(), redis.secondary.target.clone()))
        } else {
            None
        };
        Self { primary, secondary }
    }

    pub async fn warm(&self) {
        self.primary.warm().await;
        if let Some(secondary) = &self.secondary {
            secondary.warm().await;
        }
    }

    pub fn pool(&self, name: BackendName) -> &Arc<Pool> {
        match name {
            BackendName::Primary => &self.primary,
            BackendName::Secondary => self
                .secondary
                .as_ref()
                .expect("selector must not route to a disabled secondary"),
        }
    }

    pub fn stats(&self) -> std::collections::HashMap<String, PoolStatsSnapshot> {
        let mut map = std::collections::HashMap::new();
        map.insert("primary".to_string(), self.primary.stats());
        if let Some(secondary) = &self.secondary {
            map.insert("secondary".to_string(), secondary.stats());
        }
        map
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendName {
    Primary,
    Secondary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisSection;

    fn test_pool_config() -> PoolConfig {
        PoolConfig {
            min_idle: 0,
            max_idle: 2,
            max_active: 2,
            idle_timeout_secs: 300,
            max_lifetime_secs: 3600,
            pool_timeout_secs: 1,
        }
    }

    #[test]
    fn backend_pool_skips_secondary_when_disabled() {
        let redis = RedisSection::default();
        let pool = BackendPool::new(&test_pool_config(), &redis);
        assert!(pool.secondary.is_none());
    }

    #[test]
    fn stats_start_empty() {
        let pool = Pool::new("primary", test_pool_config(), RedisTarget::default());
        let stats = pool.stats();
        assert_eq!(stats.total_conns, 0);
        assert_eq!(stats.idle_conns, 0);
        assert_eq!(stats.active_conns, 0);
    }
}
