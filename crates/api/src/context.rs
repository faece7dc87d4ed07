use warden_auth::Principal;
use warden_core::UserId;

/// Principal context for a request (authenticated identity + roles).
///
/// Inserted by the bearer middleware; immutable for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
