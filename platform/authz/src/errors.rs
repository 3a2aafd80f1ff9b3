use thiserror::Error;

/// Configuration problems detected while building an
/// [`AuthorizationGate`](crate::AuthorizationGate). All of them are fatal at
/// startup; evaluation itself never fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("roles_middleware.path entry {0:?} must be a non-empty path starting with '/'")]
    InvalidPath(String),
    #[error("roles_middleware.{option} contains a blank role name")]
    BlankRole { option: &'static str },
    #[error("roles_middleware.{option} role {role:?} must not contain ','")]
    InvalidRole { option: &'static str, role: String },
}

pub type AuthzResult<T> = Result<T, AuthzError>;
