//! Configuration loading via `figment`.
//!
//! Precedence (lowest to highest): built-in defaults, `./config.toml`, `REDIS_GATE_`-
//! prefixed environment variables, then a handful of bare environment overrides
//! (`PORT`, `HOST`, `REDIS_URL`, `REDIS_PASSWORD`, `JWT_SECRET`, `SECONDARY_URL`),
//! which always win over everything else.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisSection,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: RedisSection::default(),
            pool: PoolConfig::default(),
            auth: AuthConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, `./config.toml` (if present), and environment
    /// overrides, in that precedence order. Never fails because a config file is
    /// missing; only malformed TOML/env values are surfaced as errors.
    pub fn load() -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("REDIS_GATE_").split("__"));

        let mut config: Config = figment.extract()?;
        config.apply_bare_env_overrides();
        Ok(config)
    }

    /// Applies a handful of bare (unprefixed) environment variables that must be
    /// honored regardless of whether a config file or `REDIS_GATE_` layer set them.
    fn apply_bare_env_overrides(&mut self) {
        use std::env;

        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(host) = env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(url) = env::var("REDIS_URL") {
            self.redis.primary.addr = url;
        }
        if let Ok(password) = env::var("REDIS_PASSWORD") {
            self.redis.primary.password = Some(password);
        }
        if let Ok(secret) = env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Ok(url) = env::var("SECONDARY_URL") {
            self.redis.secondary.enabled = true;
            self.redis.secondary.target.addr = url;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub http2: bool,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            http2: true,
            tls: None,
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSection {
    #[serde(default)]
    pub primary: RedisTarget,
    #[serde(default)]
    pub secondary: SecondaryRedisTarget,
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            primary: RedisTarget::default(),
            secondary: SecondaryRedisTarget::default(),
        }
    }
}

/// Connection coordinates and transport timeouts for one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisTarget {
    #[serde(default = "default_primary_addr")]
    pub addr: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_secs: u64,
    #[serde(default = "default_rw_timeout")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_rw_timeout")]
    pub write_timeout_secs: u64,
}

impl Default for RedisTarget {
    fn default() -> Self {
        Self {
            addr: default_primary_addr(),
            password: None,
            db: 0,
            max_retries: default_max_retries(),
            dial_timeout_secs: default_dial_timeout(),
            read_timeout_secs: default_rw_timeout(),
            write_timeout_secs: default_rw_timeout(),
        }
    }
}

impl RedisTarget {
    /// `redis://[:password@]host:port/db` connection string for `redis::Client::open`.
    pub fn connection_url(&self) -> String {
        let addr = self.addr.trim_start_matches("redis://");
        match &self.password {
            Some(pw) if !pw.is_empty() => format!("redis://:{pw}@{addr}/{db}", db = self.db),
            _ => format!("redis://{addr}/{db}", db = self.db),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryRedisTarget {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub target: RedisTarget,
}

impl Default for SecondaryRedisTarget {
    fn default() -> Self {
        Self {
            enabled: false,
            target: RedisTarget::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_min_idle")]
    pub min_idle: usize,
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
    #[serde(default = "default_max_active")]
    pub max_active: usize,
    #[serde(default = "default_idle_timeout_pool")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_idle: default_min_idle(),
            max_idle: default_max_idle(),
            max_active: default_max_active(),
            idle_timeout_secs: default_idle_timeout_pool(),
            max_lifetime_secs: default_max_lifetime(),
            pool_timeout_secs: default_pool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: String::new(),
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    pub tenant_id: String,
    #[serde(default)]
    pub rate_limit: Option<u32>,
    #[serde(default = "default_allowed_dbs")]
    pub allowed_dbs: Vec<u8>,
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_read_timeout() -> u64 {
    30
}
fn default_write_timeout() -> u64 {
    30
}
fn default_idle_timeout() -> u64 {
    120
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_primary_addr() -> String {
    "localhost:6379".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_dial_timeout() -> u64 {
    5
}
fn default_rw_timeout() -> u64 {
    5
}
fn default_min_idle() -> usize {
    5
}
fn default_max_idle() -> usize {
    100
}
fn default_max_active() -> usize {
    1000
}
fn default_idle_timeout_pool() -> u64 {
    300
}
fn default_max_lifetime() -> u64 {
    3600
}
fn default_pool_timeout() -> u64 {
    5
}
fn default_allowed_dbs() -> Vec<u8> {
    (0..16).collect()
}
fn default_permissions() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_metrics_path() -> String {
    "/metrics".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.redis.primary.addr, "localhost:6379");
        assert_eq!(config.pool.min_idle, 5);
        assert_eq!(config.pool.max_idle, 100);
        assert_eq!(config.pool.max_active, 1000);
        assert_eq!(config.metrics.path, "/metrics");
    }

    #[test]
    fn connection_url_without_password() {
        let target = RedisTarget {
            addr: "localhost:6379".into(),
            password: None,
            db: 2,
            ..RedisTarget::default()
        };
        assert_eq!(target.connection_url(), "redis://localhost:6379/2");
    }

    #[test]
    fn connection_url_with_password() {
        let target = RedisTarget {
            addr: "localhost:6379".into(),
            password: Some("secret".into()),
            db: 0,
            ..RedisTarget::default()
        };
        assert_eq!(target.connection_url(), "redis://:secret@localhost:6379/0");
    }

    #[test]
    fn load_never_fails_without_config_file() {
        let config = Config::load().expect("defaults alone must load");
        assert_eq!(config.server.port, 8080);
    }
}
