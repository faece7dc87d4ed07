//! Role checks over a verified principal.
//!
//! - No IO
//! - No panics
//! - Claims only: the store is never consulted

use thiserror::Error;

use warden_core::ServiceError;

use crate::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated => ServiceError::Unauthenticated,
            AuthzError::Forbidden(reason) => ServiceError::Forbidden(reason),
        }
    }
}

/// Pass iff the principal holds a role named exactly `role`.
pub fn require_role(principal: &Principal, role: &str) -> Result<(), AuthzError> {
    if principal.has_role(role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!("missing required role '{role}'")))
    }
}

/// Pass iff every listed role is held. An empty list passes.
pub fn require_all_of(principal: &Principal, roles: &[&str]) -> Result<(), AuthzError> {
    roles.iter().try_for_each(|role| require_role(principal, role))
}

/// Pass iff at least one listed role is held. An empty list denies.
pub fn require_any_of(principal: &Principal, roles: &[&str]) -> Result<(), AuthzError> {
    if roles.iter().any(|role| principal.has_role(role)) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!(
            "requires one of the roles {roles:?}"
        )))
    }
}
