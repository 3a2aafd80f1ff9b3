use anyhow::{Context, Result};
use platform_authz::{AuthorizationGate, RolesConfig};

pub const ENV_ROLES_PATH: &str = "ROLES_MIDDLEWARE_PATH";
pub const ENV_DEFAULT_ROLES: &str = "ROLES_MIDDLEWARE_DEFAULT_ROLES";
pub const ENV_AGENT_ROLES: &str = "ROLES_MIDDLEWARE_AGENT_ROLES";
pub const ENV_CORS_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub roles: RolesConfig,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Unset
    /// `ROLES_MIDDLEWARE_PATH` keeps the default of `/`; set but empty
    /// disables the gate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RolesConfig::default();
        let roles = RolesConfig {
            path: lookup(ENV_ROLES_PATH)
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.path),
            default_roles: lookup(ENV_DEFAULT_ROLES)
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            agent_roles: lookup(ENV_AGENT_ROLES)
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        };

        let cors_allowed_origins = lookup(ENV_CORS_ORIGINS)
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let config = Self {
            roles,
            cors_allowed_origins,
        };
        // Fail at startup rather than on the first request.
        config.gate()?;
        Ok(config)
    }

    pub fn gate(&self) -> Result<AuthorizationGate> {
        AuthorizationGate::new(&self.roles).context("invalid roles_middleware configuration")
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.roles, RolesConfig::default());
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn lists_are_split_and_trimmed() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_ROLES_PATH, "/v2.0/log, /v3.0/logs"),
            (ENV_DEFAULT_ROLES, "monasca-user,,admin "),
            (ENV_AGENT_ROLES, "monasca-log-agent"),
        ]))
        .unwrap();
        assert_eq!(config.roles.path, vec!["/v2.0/log", "/v3.0/logs"]);
        assert_eq!(config.roles.default_roles, vec!["monasca-user", "admin"]);
        let gate = config.gate().unwrap();
        assert!(gate.agent_roles().contains("monasca-log-agent"));
    }

    #[test]
    fn empty_path_disables_gate() {
        let config = AppConfig::from_lookup(lookup(&[(ENV_ROLES_PATH, "")])).unwrap();
        assert!(config.roles.path.is_empty());
        assert!(!config.gate().unwrap().applies_to("POST", "/v2.0/log"));
    }

    #[test]
    fn malformed_path_fails_to_load() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_ROLES_PATH, "v2.0/log")])).unwrap_err();
        assert!(err.to_string().contains("roles_middleware"));
    }
}
