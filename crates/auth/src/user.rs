//! User account records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::roles::Role;
use crate::Principal;

/// A stored user account with its roles loaded.
///
/// # Invariants
/// - `email` is unique across all users (enforced by the store).
/// - `password_hash` is always a bcrypt digest, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name.as_str() == name)
    }

    /// Snapshot of this account as it will be embedded in a token.
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.roles.iter().map(Role::summary).collect())
    }

    /// Public projection (no password hash).
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            created_at: self.created_at,
            roles: self.roles.clone(),
        }
    }
}

/// User as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub roles: Vec<Role>,
}

/// Account data ready to be persisted (password already hashed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Canonical email form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
