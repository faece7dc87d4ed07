//! Account & role orchestration (application-level).
//!
//! `AccountManager` composes the identity store, the credential hasher and the
//! token service behind one operation per externally callable action:
//!
//! ```text
//! request
//!   ↓
//! 1. Authorize against the policy table (pure, claims only, no store access)
//!   ↓
//! 2. Validate input (permissions, pagination)
//!   ↓
//! 3. One store call per write (the store owns atomicity)
//!   ↓
//! 4. Envelope { message, data?, meta? }
//! ```
//!
//! A failed authorization or validation step never reaches the store.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use warden_auth::{
    authorize, hash_password, normalize_email, validate_permissions, verify_password,
    Hs256TokenService, IssuedToken, NewRole, NewUser, Operation, Principal, Role, RoleName,
    UserView, ADMIN_ROLE,
};
use warden_core::{Envelope, PageRequest, Paginated, RoleId, ServiceError, ServiceResult, UserId};

use crate::store::IdentityStore;

/// Registration input, already validated at the transport boundary
/// (email format, password strength).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Role creation input. Permissions arrive as raw strings and are checked
/// against the vocabulary before anything is persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    pub permissions: Vec<String>,
}

#[derive(Clone)]
pub struct AccountManager {
    store: Arc<dyn IdentityStore>,
    tokens: Arc<Hs256TokenService>,
}

impl std::fmt::Debug for AccountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountManager").finish_non_exhaustive()
    }
}

impl AccountManager {
    pub fn new(store: Arc<dyn IdentityStore>, tokens: Arc<Hs256TokenService>) -> Self {
        Self { store, tokens }
    }

    #[cfg(test)]
    fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    #[instrument(skip(self, input), err)]
    pub async fn register(&self, input: Registration) -> ServiceResult<Envelope<()>> {
        authorize(None, Operation::Register)?;

        let email = normalize_email(&input.email);
        let password_hash = hash_blocking(input.password).await?;

        let user = NewUser {
            id: UserId::new(),
            email,
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            created_at: Utc::now(),
        };
        let created = self.store.create_user(user, &Role::default_user()).await?;
        info!(user_id = %created.id, "user registered");

        Ok(Envelope::message("User successfully created!"))
    }

    #[instrument(skip(self, email, password), err)]
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<Envelope<IssuedToken>> {
        authorize(None, Operation::Login)?;

        let email = normalize_email(email);
        let user = self.store.find_user_by_email(&email).await?;

        // Same bcrypt work on both paths so a missing account is not observable.
        let digest = match &user {
            Some(u) => u.password_hash.clone(),
            None => String::new(),
        };
        let matched = verify_blocking(password.to_string(), digest).await?;

        let user = match user {
            Some(user) if matched => user,
            _ => {
                debug!("login rejected");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let token = self.tokens.issue(&user.principal())?;
        info!(user_id = %user.id, "token issued");
        Ok(Envelope::with_data("Logged in successfully!", token))
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err)]
    pub async fn list_users(
        &self,
        principal: &Principal,
        page: PageRequest,
    ) -> ServiceResult<Envelope<Vec<UserView>>> {
        authorize(Some(principal), Operation::ListUsers)?;

        let total = self.store.count_users().await?;
        let users = self
            .store
            .list_users(u64::from(page.limit()), page.skipped())
            .await?;

        Ok(Envelope::page(
            "Fetched all users successfully!",
            Paginated {
                data: users.iter().map(|u| u.view()).collect(),
                meta: page.meta(total),
            },
        ))
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id), err)]
    pub async fn list_roles(
        &self,
        principal: &Principal,
        page: PageRequest,
    ) -> ServiceResult<Envelope<Vec<Role>>> {
        authorize(Some(principal), Operation::ListRoles)?;

        let total = self.store.count_roles().await?;
        let roles = self
            .store
            .list_roles(u64::from(page.limit()), page.skipped())
            .await?;

        Ok(Envelope::page(
            "Fetched all roles successfully!",
            Paginated {
                data: roles,
                meta: page.meta(total),
            },
        ))
    }

    #[instrument(skip(self, principal, input), fields(user_id = %principal.user_id, role = %input.name), err)]
    pub async fn create_role(
        &self,
        principal: &Principal,
        input: RoleDefinition,
    ) -> ServiceResult<Envelope<Role>> {
        authorize(Some(principal), Operation::CreateRole)?;

        let permissions = validate_permissions(&input.permissions)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("role name must not be empty"));
        }

        let role = self
            .store
            .create_role(NewRole {
                name: RoleName::new(name.to_string()),
                permissions,
            })
            .await?;
        info!(role_id = %role.id, "role created");

        Ok(Envelope::with_data("Role successfully created!", role))
    }

    #[instrument(skip(self, principal), fields(actor = %principal.user_id), err)]
    pub async fn assign_role(
        &self,
        principal: &Principal,
        user_id: UserId,
        role_id: RoleId,
    ) -> ServiceResult<Envelope<()>> {
        authorize(Some(principal), Operation::AssignRole)?;

        self.store.connect_user_role(user_id, role_id).await?;
        info!(%user_id, %role_id, "role assigned");

        Ok(Envelope::message("Role successfully assigned!"))
    }

    #[instrument(skip(self, principal), fields(actor = %principal.user_id), err)]
    pub async fn delete_user(&self, principal: &Principal, target: UserId) -> ServiceResult<Envelope<()>> {
        if principal.user_id == target {
            return Err(ServiceError::forbidden("cannot delete own account"));
        }
        authorize(Some(principal), Operation::DeleteUser)?;

        let user = self
            .store
            .find_user_by_id(target)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("user {target}")))?;

        // NOTE: preserved rule, only accounts that already hold the admin role
        // can be deleted. Non-admin targets are refused. This reads backwards
        // but is the established behavior; change it only together with the
        // callers that depend on it.
        if !user.has_role(ADMIN_ROLE) {
            return Err(ServiceError::forbidden("insufficient permissions"));
        }

        self.store.delete_user(target).await?;
        info!(user_id = %target, "user deleted");

        Ok(Envelope::message("User successfully deleted!"))
    }

    /// Ensure the reserved admin role exists and `email` holds it.
    ///
    /// Idempotent: an existing account keeps its password and just gains the
    /// role if it was missing.
    #[instrument(skip(self, email, password), err)]
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> ServiceResult<UserId> {
        let admin = self.store.connect_or_create_role(&Role::admin()).await?;
        let email = normalize_email(email);

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                let password_hash = hash_blocking(password.to_string()).await?;
                let user = NewUser {
                    id: UserId::new(),
                    email,
                    password_hash,
                    first_name: None,
                    last_name: None,
                    created_at: Utc::now(),
                };
                match self.store.create_user(user, &Role::default_user()).await {
                    Ok(user) => user,
                    Err(err) => {
                        warn!(error = %err, "admin account creation failed");
                        return Err(err.into());
                    }
                }
            }
        };

        if !user.has_role(admin.name.as_str()) {
            self.store.connect_user_role(user.id, admin.id).await?;
        }
        info!(user_id = %user.id, "admin account ready");
        Ok(user.id)
    }
}

fn decoy_digest() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_password("warden-decoy-password").unwrap_or_default())
}

async fn hash_blocking(password: String) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::internal(format!("hashing task failed: {e}")))?
        .map_err(Into::into)
}

async fn verify_blocking(password: String, digest: String) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || {
        if digest.is_empty() {
            verify_password(&password, decoy_digest());
            return false;
        }
        verify_password(&password, &digest)
    })
    .await
    .map_err(|e| ServiceError::internal(format!("verification task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use warden_auth::{NewRole, Permission, RoleSummary, TokenVerifier, User};
    use warden_core::ErrorKind;

    use crate::store::{InMemoryIdentityStore, StoreError};

    const SECRET: &[u8] = b"test-secret";

    /// Counts every store call before delegating to the in-memory store.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryIdentityStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl IdentityStore for CountingStore {
        async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            self.hit();
            self.inner.find_user_by_email(email).await
        }
        async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
            self.hit();
            self.inner.find_user_by_id(id).await
        }
        async fn create_user(&self, user: NewUser, default_role: &Role) -> Result<User, StoreError> {
            self.hit();
            self.inner.create_user(user, default_role).await
        }
        async fn connect_user_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
            self.hit();
            self.inner.connect_user_role(user_id, role_id).await
        }
        async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
            self.hit();
            self.inner.delete_user(id).await
        }
        async fn count_users(&self) -> Result<u64, StoreError> {
            self.hit();
            self.inner.count_users().await
        }
        async fn list_users(&self, limit: u64, skip: u64) -> Result<Vec<User>, StoreError> {
            self.hit();
            self.inner.list_users(limit, skip).await
        }
        async fn create_role(&self, role: NewRole) -> Result<Role, StoreError> {
            self.hit();
            self.inner.create_role(role).await
        }
        async fn connect_or_create_role(&self, role: &Role) -> Result<Role, StoreError> {
            self.hit();
            self.inner.connect_or_create_role(role).await
        }
        async fn count_roles(&self) -> Result<u64, StoreError> {
            self.hit();
            self.inner.count_roles().await
        }
        async fn list_roles(&self, limit: u64, skip: u64) -> Result<Vec<Role>, StoreError> {
            self.hit();
            self.inner.list_roles(limit, skip).await
        }
    }

    fn manager_with(store: Arc<dyn IdentityStore>) -> AccountManager {
        AccountManager::new(store, Arc::new(Hs256TokenService::new(SECRET).unwrap()))
    }

    fn manager() -> AccountManager {
        manager_with(Arc::new(InMemoryIdentityStore::new()))
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "Str0ng!Pass".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
        }
    }

    fn admin_principal() -> Principal {
        Principal::new(UserId::new(), vec![Role::admin().summary()])
    }

    fn plain_principal() -> Principal {
        Principal::new(UserId::new(), vec![Role::default_user().summary()])
    }

    fn verifier() -> Hs256TokenService {
        Hs256TokenService::new(SECRET).unwrap()
    }

    #[tokio::test]
    async fn register_attaches_default_role_and_normalizes_email() {
        let m = manager();
        let out = m.register(registration("  A@X.com ")).await.unwrap();
        assert_eq!(out.message, "User successfully created!");

        let user = m.store().find_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.roles, vec![Role::default_user()]);
        assert_ne!(user.password_hash, "Str0ng!Pass");
        assert!(user.password_hash.starts_with("$2"));
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let m = manager();
        m.register(registration("a@x.com")).await.unwrap();
        let err = m.register(registration("A@x.com")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn login_issues_token_with_roles() {
        let m = manager();
        m.register(registration("a@x.com")).await.unwrap();

        let out = m.login("a@x.com", "Str0ng!Pass").await.unwrap();
        let token = out.data.unwrap();
        assert!(token.expires_at > token.issued_at);

        let principal = verifier().verify(&token.access_token).unwrap();
        assert_eq!(principal.roles, vec![RoleSummary::new("user", vec![Permission::Write])]);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let m = manager();
        m.register(registration("a@x.com")).await.unwrap();

        let wrong_password = m.login("a@x.com", "nope").await.unwrap_err();
        let unknown_email = m.login("ghost@x.com", "Str0ng!Pass").await.unwrap_err();

        assert_eq!(wrong_password, ServiceError::InvalidCredentials);
        assert_eq!(wrong_password, unknown_email);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn listing_users_requires_admin_and_touches_nothing_otherwise() {
        let store = Arc::new(CountingStore::default());
        let m = manager_with(store.clone());

        let err = m.list_users(&plain_principal(), PageRequest::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listing_users_paginates() {
        let m = manager();
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            m.register(registration(email)).await.unwrap();
        }

        let out = m
            .list_users(&admin_principal(), PageRequest::new(2, 2).unwrap())
            .await
            .unwrap();
        let meta = out.meta.unwrap();
        assert_eq!(meta.total_count, 3);
        assert_eq!(meta.skipped, 2);
        assert!(!meta.has_next);
        assert!(meta.has_prev);
        assert_eq!(out.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_permission_is_rejected_without_persisting() {
        let m = manager();
        let err = m
            .create_role(
                &admin_principal(),
                RoleDefinition {
                    name: "auditor".to_string(),
                    permissions: vec!["READ".to_string(), "delete".to_string(), "X".to_string()],
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "Invalid permission: delete");
        assert_eq!(m.store().count_roles().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_and_assign_role() {
        let m = manager();
        m.register(registration("a@x.com")).await.unwrap();
        let user = m.store().find_user_by_email("a@x.com").await.unwrap().unwrap();

        let role = m
            .create_role(
                &admin_principal(),
                RoleDefinition {
                    name: "auditor".to_string(),
                    permissions: vec!["READ".to_string()],
                },
            )
            .await
            .unwrap()
            .data
            .unwrap();

        m.assign_role(&admin_principal(), user.id, role.id).await.unwrap();
        m.assign_role(&admin_principal(), user.id, role.id).await.unwrap();

        let user = m.store().find_user_by_id(user.id).await.unwrap().unwrap();
        assert!(user.has_role("auditor"));
        assert_eq!(user.roles.len(), 2);

        let err = m
            .assign_role(&admin_principal(), user.id, RoleId::new(404))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn self_delete_is_refused_before_any_store_read() {
        let store = Arc::new(CountingStore::default());
        let m = manager_with(store.clone());

        for principal in [admin_principal(), plain_principal(), Principal::new(UserId::new(), vec![])] {
            let err = m.delete_user(&principal, principal.user_id).await.unwrap_err();
            assert_eq!(err, ServiceError::forbidden("cannot delete own account"));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn delete_only_removes_admin_accounts() {
        let m = manager();
        m.register(registration("a@x.com")).await.unwrap();
        let plain = m.store().find_user_by_email("a@x.com").await.unwrap().unwrap();

        let err = m.delete_user(&admin_principal(), plain.id).await.unwrap_err();
        assert_eq!(err, ServiceError::forbidden("insufficient permissions"));

        let admin_id = m.bootstrap_admin("root@x.com", "Adm1n!Pass").await.unwrap();
        let out = m.delete_user(&admin_principal(), admin_id).await.unwrap();
        assert_eq!(out.message, "User successfully deleted!");
        assert!(m.store().find_user_by_id(admin_id).await.unwrap().is_none());

        let missing = m.delete_user(&admin_principal(), UserId::new()).await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn non_admin_callers_never_reach_the_store() {
        let store = Arc::new(CountingStore::default());
        let m = manager_with(store.clone());
        let page = PageRequest::default;

        for principal in [plain_principal(), Principal::new(UserId::new(), vec![])] {
            let outcomes: Vec<(&str, ServiceResult<()>)> = vec![
                ("list_users", m.list_users(&principal, page()).await.map(drop)),
                ("list_roles", m.list_roles(&principal, page()).await.map(drop)),
                (
                    "create_role",
                    m.create_role(
                        &principal,
                        RoleDefinition {
                            name: "auditor".to_string(),
                            permissions: vec!["READ".to_string()],
                        },
                    )
                    .await
                    .map(drop),
                ),
                (
                    "assign_role",
                    m.assign_role(&principal, UserId::new(), RoleId::new(1)).await.map(drop),
                ),
                ("delete_user", m.delete_user(&principal, UserId::new()).await.map(drop)),
            ];

            for (op, outcome) in outcomes {
                let err = outcome.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Forbidden, "{op}");
            }
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn permissions_are_checked_before_the_role_name() {
        let m = manager();
        let err = m
            .create_role(
                &admin_principal(),
                RoleDefinition {
                    name: "  ".to_string(),
                    permissions: vec!["nope".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::validation("Invalid permission: nope"));

        let err = m
            .create_role(
                &admin_principal(),
                RoleDefinition {
                    name: "  ".to_string(),
                    permissions: vec!["READ".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::validation("role name must not be empty"));
        assert_eq!(m.store().count_roles().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn bootstrap_admin_is_idempotent() {
        let m = manager();
        let first = m.bootstrap_admin("root@x.com", "Adm1n!Pass").await.unwrap();
        let second = m.bootstrap_admin("root@x.com", "other").await.unwrap();
        assert_eq!(first, second);

        let token = m.login("root@x.com", "Adm1n!Pass").await.unwrap().data.unwrap();
        let principal = verifier().verify(&token.access_token).unwrap();
        assert!(principal.has_role(ADMIN_ROLE));

        let roles = m.list_roles(&principal, PageRequest::default()).await.unwrap();
        let names: Vec<String> = roles
            .data
            .unwrap()
            .iter()
            .map(|r| r.name.to_string())
            .collect();
        assert_eq!(names, vec!["admin", "user"]);
    }
}
