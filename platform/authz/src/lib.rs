//! Role-header authorization for the log API.
//!
//! Requests reach this gate after an upstream authenticator has validated the
//! caller and attached `X-Identity-Status`, `X-Roles` and `X-Tenant-Id`. The
//! gate lets a request through when it is confirmed and carries one of the
//! configured default or agent roles, and answers with a JSON 401 otherwise.
//! Agent roles additionally flag the request via [`RequestContext`].
//!
//! The gate only applies to configured path prefixes and never to `OPTIONS`.

mod config;
mod errors;
mod gate;
mod layer;
mod roles;

pub use config::RolesConfig;
pub use errors::{AuthzError, AuthzResult};
pub use gate::{
    AuthorizationGate, CONFIRMED_STATUS, Decision, Denial, DenialBody, DenialReason, Outcome,
    RequestContext, RequestView, X_IDENTITY_STATUS, X_ROLES, X_TENANT_ID,
};
pub use layer::{RoleFuture, RoleLayer, RoleService};
pub use roles::RoleSet;
