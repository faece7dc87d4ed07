use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use warden_core::RoleId;

use crate::permissions::Permission;

/// Name of the role that unlocks every admin-only operation.
pub const ADMIN_ROLE: &str = "admin";

/// Name of the role attached to every newly registered account.
pub const DEFAULT_ROLE: &str = "user";

/// Role name used for authorization checks.
///
/// Compared case-sensitively, byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for RoleName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

/// A persisted role definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<Cow<'static, str>>, permissions: Vec<Permission>) -> Self {
        Self {
            id,
            name: RoleName::new(name),
            permissions,
        }
    }

    /// Reserved default role: `{id: 2, name: "user", permissions: [WRITE]}`.
    pub fn default_user() -> Self {
        Self::new(RoleId::new(2), DEFAULT_ROLE, vec![Permission::Write])
    }

    /// Reserved admin role: `{id: 1, name: "admin", permissions: [READ, WRITE]}`.
    pub fn admin() -> Self {
        Self::new(RoleId::new(1), ADMIN_ROLE, vec![Permission::Read, Permission::Write])
    }

    /// The part of the role that is embedded in tokens.
    pub fn summary(&self) -> RoleSummary {
        RoleSummary {
            name: self.name.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

/// Role claim carried by a token (name + permissions, no id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub name: RoleName,
    pub permissions: Vec<Permission>,
}

impl RoleSummary {
    pub fn new(name: impl Into<Cow<'static, str>>, permissions: Vec<Permission>) -> Self {
        Self {
            name: RoleName::new(name),
            permissions,
        }
    }
}

/// A validated role definition that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: RoleName,
    pub permissions: Vec<Permission>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_roles() {
        let user = Role::default_user();
        assert_eq!(user.id, RoleId::new(2));
        assert_eq!(user.name.as_str(), "user");
        assert_eq!(user.permissions, vec![Permission::Write]);

        let admin = Role::admin();
        assert_eq!(admin.id, RoleId::new(1));
        assert!(admin.name == *ADMIN_ROLE);
    }

    #[test]
    fn summary_drops_the_id() {
        let json = serde_json::to_value(Role::default_user().summary()).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "user", "permissions": ["WRITE"] }));
    }
}
