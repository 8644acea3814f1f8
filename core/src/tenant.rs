//! `Tenant` and `AuthorityGate`: per-tenant command and database access
//! control, built once at config load and shared read-only thereafter.

use std::collections::HashSet;

use crate::config::{ApiKeyEntry, AuthConfig};

/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: String,
    pub rate_limit: Option<u32>,
    pub allowed_dbs: HashSet<u8>,
    pub permissions: Vec<String>,
}

impl Tenant {
    pub fn from_api_key_entry(entry: &ApiKeyEntry) -> Self {
        Self {
            id: entry.tenant_id.clone(),
            rate_limit: entry.rate_limit,
            allowed_dbs: entry.allowed_dbs.iter().copied().collect(),
            permissions: entry.permissions.clone(),
        }
    }

    /// Synthetic tenant returned when global authorization is disabled:
    /// `*` permissions, full DB allow-list.
    pub fn default_tenant() -> Self {
        Self {
            id: "default".to_string(),
            rate_limit: None,
            allowed_dbs: (0u8..16).collect(),
            permissions: vec!["*".to_string()],
        }
    }
}

/// Looks up tenants by API key; JWT-carried tenants are constructed directly
/// from validated claims and never touch this table.
#[derive(Debug, Clone)]
pub struct TenantTable {
    enabled: bool,
    by_key: Vec<(String, Tenant)>,
}

impl TenantTable {
    pub fn from_config(auth: &AuthConfig) -> Self {
        let by_key = auth
            .api_keys
            .iter()
            .map(|entry| (entry.key.clone(), Tenant::from_api_key_entry(entry)))
            .collect();
        Self {
            enabled: auth.enabled,
            by_key,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Exact API-key match. Used for `Bearer <api-key>` and the raw legacy header.
    pub fn find_by_key(&self, key: &str) -> Option<&Tenant> {
        self.by_key
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, tenant)| tenant)
    }

    /// Looks up by key and independently returns the tenant id registered for it,
    /// for the Basic-auth constant-time comparison.
    pub fn find_by_key_with_id(&self, key: &str) -> Option<(&str, &Tenant)> {
        self.by_key
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, tenant)| (tenant.id.as_str(), tenant))
    }
}

/// Result of an authority decision, carrying a textual reason for denials
/// (naming the command and tenant id).
pub type GateResult = Result<(), String>;

/// Stateless decision logic; holds no data of its own so it can be constructed
/// freely at the call site.
pub struct AuthorityGate;

impl AuthorityGate {
    /// Ordered permission matching:
    /// 1. `*` anywhere in the tenant's permissions allows everything.
    /// 2. An exact (case-insensitive) match allows.
    /// 3. A `*`-suffixed prefix match allows.
    /// 4. Otherwise deny, naming the command and tenant id.
    pub fn check_command(tenant: &Tenant, command: &str) -> GateResult {
        let command_upper = command.to_ascii_uppercase();

        if tenant.permissions.iter().any(|p| p == "*") {
            return Ok(());
        }
        if tenant
            .permissions
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&command_upper))
        {
            return Ok(());
        }
        if tenant.permissions.iter().any(|p| {
            p.ends_with('*') && command_upper.starts_with(&p[..p.len() - 1].to_ascii_uppercase())
        }) {
            return Ok(());
        }

        Err(format!(
            "Command not permitted: {command_upper} for tenant {}",
            tenant.id
        ))
    }

    /// `db ∈ tenant.allowed-DBs`.
    pub fn check_db(tenant: &Tenant, db: u8) -> GateResult {
        if tenant.allowed_dbs.contains(&db) {
            Ok(())
        } else {
            Err(format!(
                "Database not permitted: db {db} for tenant {}",
                tenant.id
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant_with(permissions: &[&str]) -> Tenant {
        Tenant {
            id: "t1".to_string(),
            rate_limit: None,
            allowed_dbs: [0, 1].into_iter().collect(),
            permissions: permissions.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn wildcard_allows_everything() {
        let tenant = tenant_with(&["*"]);
        assert!(AuthorityGate::check_command(&tenant, "FLUSHALL").is_ok());
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let tenant = tenant_with(&["get"]);
        assert!(AuthorityGate::check_command(&tenant, "GET").is_ok());
        assert!(AuthorityGate::check_command(&tenant, "get").is_ok());
    }

    #[test]
    fn prefix_wildcard_match() {
        let tenant = tenant_with(&["GET*"]);
        assert!(AuthorityGate::check_command(&tenant, "GETRANGE").is_ok());
        assert!(AuthorityGate::check_command(&tenant, "getset").is_ok());
    }

    #[test]
    fn deny_names_command_and_tenant() {
        let tenant = tenant_with(&["GET*"]);
        let err = AuthorityGate::check_command(&tenant, "SET").unwrap_err();
        assert!(err.contains("SET"));
        assert!(err.contains("t1"));
    }

    #[test]
    fn db_allow_list() {
        let tenant = tenant_with(&["*"]);
        assert!(AuthorityGate::check_db(&tenant, 0).is_ok());
        assert!(AuthorityGate::check_db(&tenant, 5).is_err());
    }

    #[test]
    fn permission_checks_are_monotone_under_added_patterns() {
        // allow(t, cmd) must stay true (or become true) as more patterns are
        // added, never flip from allowed to denied.
        let mut tenant = tenant_with(&["GET*"]);
        assert!(AuthorityGate::check_command(&tenant, "GETRANGE").is_ok());
        tenant.permissions.push("SET".to_string());
        assert!(AuthorityGate::check_command(&tenant, "GETRANGE").is_ok());
        assert!(AuthorityGate::check_command(&tenant, "SET").is_ok());
    }

    #[test]
    fn default_tenant_allows_all_dbs_and_commands() {
        let tenant = Tenant::default_tenant();
        assert!(AuthorityGate::check_command(&tenant, "ANYTHING").is_ok());
        for db in 0..16 {
            assert!(AuthorityGate::check_db(&tenant, db).is_ok());
        }
    }

    #[test]
    fn tenant_table_exact_key_lookup() {
        let auth = AuthConfig {
            enabled: true,
            jwt_secret: String::new(),
            api_keys: vec![ApiKeyEntry {
                key: "key-1".to_string(),
                tenant_id: "tenant-1".to_string(),
                rate_limit: None,
                allowed_dbs: vec![0],
                permissions: vec!["GET*".to_string()],
            }],
        };
        let table = TenantTable::from_config(&auth);
        assert!(table.find_by_key("key-1").is_some());
        assert!(table.find_by_key("missing").is_none());
    }
}
