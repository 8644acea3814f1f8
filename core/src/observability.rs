//! Tracing initialization, honoring `logging.level` and
//! `logging.format` (`json` | `pretty`) from [`Config`].

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Initializes the global `tracing` subscriber. Safe to call once; a second
/// call returns an error via `try_init`, which callers (tests) can ignore.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.logging.format.eq_ignore_ascii_case("pretty") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }

    Ok(())
}

pub fn shutdown_tracing() {
    tracing::info!("tracing shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_does_not_panic() {
        let config = Config::default();
        let _ = init_tracing(&config);
    }
}
