use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use warden_auth::{NewRole, NewUser, Role, User};
use warden_core::{RoleId, UserId};

use super::r#trait::{IdentityStore, StoreError};

#[derive(Debug, Clone)]
struct UserRow {
    user: NewUser,
    role_ids: Vec<RoleId>,
}

#[derive(Debug, Default)]
struct State {
    /// Insertion order == creation order.
    users: Vec<UserRow>,
    roles: BTreeMap<RoleId, Role>,
}

impl State {
    fn hydrate(&self, row: &UserRow) -> User {
        let roles = row
            .role_ids
            .iter()
            .filter_map(|id| self.roles.get(id).cloned())
            .collect();
        User {
            id: row.user.id,
            email: row.user.email.clone(),
            password_hash: row.user.password_hash.clone(),
            first_name: row.user.first_name.clone(),
            last_name: row.user.last_name.clone(),
            created_at: row.user.created_at,
            roles,
        }
    }

    fn next_role_id(&self) -> RoleId {
        let max = self.roles.keys().next_back().map(|id| id.get()).unwrap_or(0);
        RoleId::new(max + 1)
    }

    fn connect_or_create(&mut self, role: &Role) -> Role {
        if let Some(existing) = self.roles.get(&role.id) {
            return existing.clone();
        }
        if let Some(existing) = self.roles.values().find(|r| r.name == role.name) {
            return existing.clone();
        }
        self.roles.insert(role.id, role.clone());
        role.clone()
    }

    fn user_mut(&mut self, id: UserId) -> Option<&mut UserRow> {
        self.users.iter_mut().find(|row| row.user.id == id)
    }
}

/// In-memory identity store for tests/dev.
///
/// The lock stands in for the database's write serialization.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    inner: RwLock<State>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: u64, skip: u64) -> Vec<T> {
    let skip = usize::try_from(skip).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    items.skip(skip).take(limit).collect()
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.read()?;
        Ok(state
            .users
            .iter()
            .find(|row| row.user.email == email)
            .map(|row| state.hydrate(row)))
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let state = self.read()?;
        Ok(state
            .users
            .iter()
            .find(|row| row.user.id == id)
            .map(|row| state.hydrate(row)))
    }

    async fn create_user(&self, user: NewUser, default_role: &Role) -> Result<User, StoreError> {
        let mut state = self.write()?;
        if state.users.iter().any(|row| row.user.email == user.email) {
            return Err(StoreError::Conflict("email already registered".to_string()));
        }
        if state.users.iter().any(|row| row.user.id == user.id) {
            return Err(StoreError::Conflict("user id already exists".to_string()));
        }

        let role = state.connect_or_create(default_role);
        let row = UserRow {
            user,
            role_ids: vec![role.id],
        };
        let created = state.hydrate(&row);
        state.users.push(row);
        Ok(created)
    }

    async fn connect_user_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.roles.contains_key(&role_id) {
            return Err(StoreError::NotFound(format!("role {role_id}")));
        }
        let row = state
            .user_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
        if !row.role_ids.contains(&role_id) {
            row.role_ids.push(role_id);
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let before = state.users.len();
        state.users.retain(|row| row.user.id != id);
        if state.users.len() == before {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.users.len() as u64)
    }

    async fn list_users(&self, limit: u64, skip: u64) -> Result<Vec<User>, StoreError> {
        let state = self.read()?;
        let mut rows: Vec<&UserRow> = state.users.iter().collect();
        rows.sort_by(|a, b| {
            (a.user.created_at, a.user.id).cmp(&(b.user.created_at, b.user.id))
        });
        Ok(page(rows.into_iter().map(|row| state.hydrate(row)), limit, skip))
    }

    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError> {
        let mut state = self.write()?;
        if state.roles.values().any(|r| r.name == role.name) {
            return Err(StoreError::Conflict(format!("role '{}' already exists", role.name)));
        }
        let created = Role {
            id: state.next_role_id(),
            name: role.name,
            permissions: role.permissions,
        };
        state.roles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn connect_or_create_role(&self, role: &Role) -> Result<Role, StoreError> {
        Ok(self.write()?.connect_or_create(role))
    }

    async fn count_roles(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.roles.len() as u64)
    }

    async fn list_roles(&self, limit: u64, skip: u64) -> Result<Vec<Role>, StoreError> {
        let state = self.read()?;
        Ok(page(state.roles.values().cloned(), limit, skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use warden_auth::{Permission, RoleName};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            id: UserId::new(),
            email: email.to_string(),
            password_hash: "$2b$10$digest".to_string(),
            first_name: None,
            last_name: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn default_role_is_created_once_and_reused() {
        let store = InMemoryIdentityStore::new();
        let a = store.create_user(new_user("a@x.com"), &Role::default_user()).await.unwrap();
        let b = store.create_user(new_user("b@x.com"), &Role::default_user()).await.unwrap();

        assert_eq!(a.roles, vec![Role::default_user()]);
        assert_eq!(b.roles, vec![Role::default_user()]);
        assert_eq!(store.count_roles().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = InMemoryIdentityStore::new();
        store.create_user(new_user("a@x.com"), &Role::default_user()).await.unwrap();
        let err = store
            .create_user(new_user("a@x.com"), &Role::default_user())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn connect_checks_both_ids_and_is_idempotent() {
        let store = InMemoryIdentityStore::new();
        let user = store.create_user(new_user("a@x.com"), &Role::default_user()).await.unwrap();
        let admin = store.connect_or_create_role(&Role::admin()).await.unwrap();

        store.connect_user_role(user.id, admin.id).await.unwrap();
        store.connect_user_role(user.id, admin.id).await.unwrap();
        let loaded = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.roles.len(), 2);

        assert_eq!(
            store.connect_user_role(user.id, RoleId::new(99)).await,
            Err(StoreError::NotFound("role 99".to_string()))
        );
        assert!(matches!(
            store.connect_user_role(UserId::new(), admin.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn created_roles_get_ids_after_reserved_ones() {
        let store = InMemoryIdentityStore::new();
        store.connect_or_create_role(&Role::admin()).await.unwrap();
        store.connect_or_create_role(&Role::default_user()).await.unwrap();

        let auditor = store
            .create_role(NewRole {
                name: RoleName::new("auditor"),
                permissions: vec![Permission::Read],
            })
            .await
            .unwrap();
        assert_eq!(auditor.id, RoleId::new(3));

        let dup = store
            .create_role(NewRole {
                name: RoleName::new("auditor"),
                permissions: vec![],
            })
            .await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn users_are_listed_in_creation_order() {
        let store = InMemoryIdentityStore::new();
        let now = Utc::now();
        for (i, email) in ["c@x.com", "a@x.com", "b@x.com"].iter().enumerate() {
            let mut u = new_user(email);
            u.created_at = now - Duration::minutes(10 - i as i64);
            store.create_user(u, &Role::default_user()).await.unwrap();
        }

        let page = store.list_users(2, 1).await.unwrap();
        let emails: Vec<&str> = page.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn delete_missing_user_is_not_found() {
        let store = InMemoryIdentityStore::new();
        assert!(matches!(store.delete_user(UserId::new()).await, Err(StoreError::NotFound(_))));
    }
}
