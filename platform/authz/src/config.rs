use serde::Deserialize;

use crate::errors::{AuthzError, AuthzResult};
use crate::roles::RoleSet;

/// Raw `roles_middleware` options, as read from the host's configuration.
///
/// ```
/// use platform_authz::RolesConfig;
///
/// let config: RolesConfig = serde_json::from_str(
///     r#"{"path": ["/v2.0/log"], "default_roles": ["monasca-user"]}"#,
/// ).unwrap();
/// assert!(config.agent_roles.is_empty());
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RolesConfig {
    /// Path prefixes the gate applies to. Empty leaves the gate inert.
    pub path: Vec<String>,
    /// Roles allowed to enter the API.
    pub default_roles: Vec<String>,
    /// Roles identifying an agent; being an agent also authorizes.
    pub agent_roles: Vec<String>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            path: vec!["/".to_string()],
            default_roles: Vec::new(),
            agent_roles: Vec::new(),
        }
    }
}

impl RolesConfig {
    pub fn new<P, D, A>(path: P, default_roles: D, agent_roles: A) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            default_roles: default_roles.into_iter().map(Into::into).collect(),
            agent_roles: agent_roles.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn validated_paths(&self) -> AuthzResult<Vec<String>> {
        self.path
            .iter()
            .map(|raw| {
                let trimmed = raw.trim();
                if trimmed.starts_with('/') {
                    Ok(trimmed.to_string())
                } else {
                    Err(AuthzError::InvalidPath(raw.clone()))
                }
            })
            .collect()
    }

    pub(crate) fn validated_default_roles(&self) -> AuthzResult<RoleSet> {
        role_set("default_roles", &self.default_roles)
    }

    pub(crate) fn validated_agent_roles(&self) -> AuthzResult<RoleSet> {
        role_set("agent_roles", &self.agent_roles)
    }
}

fn role_set(option: &'static str, roles: &[String]) -> AuthzResult<RoleSet> {
    let mut set = RoleSet::new();
    for role in roles {
        if role.trim().is_empty() {
            return Err(AuthzError::BlankRole { option });
        }
        if role.contains(',') {
            return Err(AuthzError::InvalidRole {
                option,
                role: role.clone(),
            });
        }
        set.insert(role);
    }
    Ok(set)
}
