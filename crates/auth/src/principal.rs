use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::roles::RoleSummary;

/// Authenticated identity derived from a verified token.
///
/// A point-in-time snapshot of the roles held at login; role changes made
/// afterwards are invisible until the user logs in again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<RoleSummary>,
}

impl Principal {
    pub fn new(user_id: UserId, roles: Vec<RoleSummary>) -> Self {
        Self { user_id, roles }
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name.as_str() == name)
    }
}
