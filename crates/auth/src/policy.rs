//! Per-operation authorization policy table.
//!
//! Every externally callable operation has exactly one entry here, and
//! [`authorize`] is the single decision function that consults it.

use crate::authorize::{require_all_of, AuthzError};
use crate::roles::ADMIN_ROLE;
use crate::Principal;

/// Operations exposed by the account & role manager.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Login,
    ListUsers,
    ListRoles,
    CreateRole,
    AssignRole,
    DeleteUser,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Register,
        Operation::Login,
        Operation::ListUsers,
        Operation::ListRoles,
        Operation::CreateRole,
        Operation::AssignRole,
        Operation::DeleteUser,
    ];
}

/// Access rule attached to an operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Policy {
    /// No credential required.
    Public,
    /// An authenticated principal holding every listed role.
    AllOf(&'static [&'static str]),
}

const ADMIN_ONLY: Policy = Policy::AllOf(&[ADMIN_ROLE]);

pub fn policy_for(operation: Operation) -> Policy {
    match operation {
        Operation::Register | Operation::Login => Policy::Public,
        Operation::ListUsers
        | Operation::ListRoles
        | Operation::CreateRole
        | Operation::AssignRole
        | Operation::DeleteUser => ADMIN_ONLY,
    }
}

/// Decide whether `principal` may invoke `operation`.
pub fn authorize(principal: Option<&Principal>, operation: Operation) -> Result<(), AuthzError> {
    match policy_for(operation) {
        Policy::Public => Ok(()),
        Policy::AllOf(roles) => {
            let principal = principal.ok_or(AuthzError::Unauthenticated)?;
            require_all_of(principal, roles)
        }
    }
}
