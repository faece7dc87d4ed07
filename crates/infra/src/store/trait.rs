use async_trait::async_trait;
use thiserror::Error;

use warden_auth::{NewRole, NewUser, Role, User};
use warden_core::{RoleId, ServiceError, UserId};

/// Identity store operation error.
///
/// These are **infrastructure errors** as seen by the manager; referential and
/// uniqueness failures are the only ones with request-level meaning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A referenced user or role id does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),

    /// A stored value could not be decoded (e.g. an unknown permission).
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Connection, pool or query failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => ServiceError::not_found(what),
            StoreError::Conflict(msg) => ServiceError::conflict(msg),
            other => ServiceError::internal(other.to_string()),
        }
    }
}

/// Persistence contract for users and roles.
///
/// Each method is one atomic unit at the storage layer; the store is the
/// single source of truth and serializes conflicting writes.
///
/// ## Idempotency contracts
///
/// - `create_user` connect-or-creates `default_role` in the same transaction:
///   an existing role with that id (or name) is reused, never duplicated.
/// - `connect_or_create_role` returns the existing role when the id or name is
///   already present, otherwise inserts it as given.
/// - `connect_user_role` is a no-op when the relation already exists, and
///   fails with `NotFound` when either id is absent.
///
/// Listings are ordered deterministically: users by `(created_at, id)`, roles
/// by `id`.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Insert a user and attach (connect-or-create) `default_role`.
    ///
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser, default_role: &Role) -> Result<User, StoreError>;

    async fn connect_user_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError>;

    /// Fails with `NotFound` when the user does not exist.
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError>;

    async fn count_users(&self) -> Result<u64, StoreError>;

    async fn list_users(&self, limit: u64, skip: u64) -> Result<Vec<User>, StoreError>;

    /// Insert a role with a store-assigned id. Fails with `Conflict` on a
    /// duplicate name.
    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError>;

    async fn connect_or_create_role(&self, role: &Role) -> Result<Role, StoreError>;

    async fn count_roles(&self) -> Result<u64, StoreError>;

    async fn list_roles(&self, limit: u64, skip: u64) -> Result<Vec<Role>, StoreError>;
}
