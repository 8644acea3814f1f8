//! `BackendSelector`: routes a command name to primary or secondary.

use crate::pool::BackendName;

/// Multi-key/aggregate commands that prefer the high-throughput secondary when
/// one is configured.
const SECONDARY_COMMANDS: &[&str] = &["MGET", "MSET", "HMGET", "HMSET", "ZADD", "ZRANGE", "ZRANGEBYSCORE"];

pub struct BackendSelector {
    secondary_enabled: bool,
}

impl BackendSelector {
    pub fn new(secondary_enabled: bool) -> Self {
        Self { secondary_enabled }
    }

    /// Single-command routing. Pipelines and transactions always use
    /// [`Self::for_batch`] instead, since protocol semantics require one
    /// connection for the whole batch regardless of the commands in it.
    pub fn select(&self, command: &str) -> BackendName {
        if !self.secondary_enabled {
            return BackendName::Primary;
        }
        let upper = command.to_ascii_uppercase();
        if SECONDARY_COMMANDS.contains(&upper.as_str()) {
            BackendName::Secondary
        } else {
            BackendName::Primary
        }
    }

    /// Pipelines and transactions always route to primary.
    pub fn for_batch(&self) -> BackendName {
        BackendName::Primary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_disabled_routes_everything_to_primary() {
        let selector = BackendSelector::new(false);
        assert_eq!(selector.select("MGET"), BackendName::Primary);
        assert_eq!(selector.select("SET"), BackendName::Primary);
    }

    #[test]
    fn secondary_enabled_routes_aggregate_commands() {
        let selector = BackendSelector::new(true);
        for cmd in ["MGET", "MSET", "HMGET", "HMSET", "ZADD", "ZRANGE", "ZRANGEBYSCORE"] {
            assert_eq!(selector.select(cmd), BackendName::Secondary, "{cmd}");
            assert_eq!(selector.select(&cmd.to_lowercase()), BackendName::Secondary, "{cmd} lowercase");
        }
    }

    #[test]
    fn secondary_enabled_routes_other_commands_to_primary() {
        let selector = BackendSelector::new(true);
        assert_eq!(selector.select("SET"), BackendName::Primary);
        assert_eq!(selector.select("GET"), BackendName::Primary);
        assert_eq!(selector.select("UNKNOWNCMD"), BackendName::Primary);
    }

    #[test]
    fn batches_always_route_to_primary() {
        let selector = BackendSelector::new(true);
        assert_eq!(selector.for_batch(), BackendName::Primary);
    }
}
