use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RolesConfig;
use crate::errors::AuthzResult;
use crate::roles::RoleSet;

pub const X_IDENTITY_STATUS: &str = "x-identity-status";
pub const X_ROLES: &str = "x-roles";
pub const X_TENANT_ID: &str = "x-tenant-id";

/// Value the upstream authenticator writes to `X-Identity-Status` once the
/// caller's token has been validated.
pub const CONFIRMED_STATUS: &str = "Confirmed";

const UNKNOWN_TENANT: &str = "<unknown>";
const DENIAL_TITLE: &str = "Unauthorized";

/// Borrowed view of the request data the gate looks at.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestView<'a> {
    pub path: &'a str,
    pub method: &'a str,
    pub identity_status: Option<&'a str>,
    pub roles: Option<&'a str>,
    pub tenant_id: Option<&'a str>,
}

/// Per-request side channel filled by the gate and read by later stages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Request carried one of the configured agent roles.
    pub is_agent: bool,
}

/// Flags computed for a request the gate applies to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decision {
    pub is_authenticated: bool,
    pub is_authorized: bool,
    pub is_agent: bool,
}

impl Decision {
    /// `None` means the request may proceed.
    ///
    /// A missing role is reported ahead of a failed authentication.
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match (self.is_authenticated, self.is_authorized) {
            (true, true) => None,
            (_, false) => Some(DenialReason::MissingRole),
            (false, true) => Some(DenialReason::NotAuthenticated),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialReason {
    MissingRole,
    NotAuthenticated,
}

impl DenialReason {
    pub fn explain(self, tenant_id: Option<&str>) -> String {
        let tenant = tenant_id.unwrap_or(UNKNOWN_TENANT);
        match self {
            DenialReason::NotAuthenticated => {
                format!("Failed to authenticate request for {tenant}")
            }
            DenialReason::MissingRole => {
                format!("Tenant {tenant} is missing a required role to access this service")
            }
        }
    }
}

/// JSON body returned with a 401.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialBody {
    pub title: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Denial {
    pub reason: DenialReason,
    pub body: DenialBody,
}

impl Denial {
    pub fn new(reason: DenialReason, tenant_id: Option<&str>) -> Self {
        Self {
            reason,
            body: DenialBody {
                title: DENIAL_TITLE.to_string(),
                message: reason.explain(tenant_id),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Gate does not apply; hand the request on untouched.
    PassThrough,
    Allow,
    Deny(Denial),
}

/// Stateless role check over request headers.
///
/// Built once from [`RolesConfig`] and shared read-only between requests.
#[derive(Clone, Debug)]
pub struct AuthorizationGate {
    paths: Vec<String>,
    default_roles: RoleSet,
    agent_roles: RoleSet,
}

impl AuthorizationGate {
    pub fn new(config: &RolesConfig) -> AuthzResult<Self> {
        let gate = Self {
            paths: config.validated_paths()?,
            default_roles: config.validated_default_roles()?,
            agent_roles: config.validated_agent_roles()?,
        };
        debug!(
            paths = ?gate.paths,
            default_roles = %gate.default_roles,
            agent_roles = %gate.agent_roles,
            "role gate initialized"
        );
        Ok(gate)
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn default_roles(&self) -> &RoleSet {
        &self.default_roles
    }

    pub fn agent_roles(&self) -> &RoleSet {
        &self.agent_roles
    }

    /// `OPTIONS` never applies; otherwise the path must start with a
    /// configured prefix.
    pub fn applies_to(&self, method: &str, path: &str) -> bool {
        if method == "OPTIONS" {
            return false;
        }
        self.paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Compute the flags for a request, whether or not the gate applies.
    pub fn decide(&self, request: &RequestView<'_>) -> Decision {
        let roles = match request.roles {
            Some(raw) => RoleSet::from_header(raw),
            None => RoleSet::new(),
        };
        if roles.is_empty() {
            warn!(path = request.path, "couldn't locate X-Roles header, or it was empty");
        }

        let is_agent = roles.intersects(&self.agent_roles);
        let is_authorized = is_agent || roles.intersects(&self.default_roles);
        let is_authenticated = request.identity_status == Some(CONFIRMED_STATUS);

        Decision {
            is_authenticated,
            is_authorized,
            is_agent,
        }
    }

    /// Evaluate a request, recording the agent flag into `context` whenever
    /// the gate applies.
    pub fn evaluate(&self, request: &RequestView<'_>, context: &mut RequestContext) -> Outcome {
        if !self.applies_to(request.method, request.path) {
            debug!(path = request.path, method = request.method, "skipped in role gate");
            return Outcome::PassThrough;
        }

        let decision = self.decide(request);
        context.is_agent = decision.is_agent;

        let tenant = request.tenant_id.unwrap_or(UNKNOWN_TENANT);
        debug!(
            tenant,
            authenticated = decision.is_authenticated,
            authorized = decision.is_authorized,
            log_agent = decision.is_agent,
            "role gate flags computed"
        );

        match decision.denial_reason() {
            None => {
                debug!(tenant, "request authenticated and authorized");
                Outcome::Allow
            }
            Some(reason) => {
                let denial = Denial::new(reason, request.tenant_id);
                warn!(tenant, reason = ?reason, "{}", denial.body.message);
                Outcome::Deny(denial)
            }
        }
    }
}
