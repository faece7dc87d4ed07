//! Postgres-backed identity store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate email / role name |
//! | Database (foreign key violation) | `23503` | `NotFound` | Connecting an absent user or role |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / network / other | N/A | `Backend` | Connection failures |
//!
//! ## Thread Safety
//!
//! `PostgresIdentityStore` is `Send + Sync`; the SQLx pool handles connection
//! sharing. Multi-statement writes run inside a single transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use warden_auth::{
    deserialize_permissions, serialize_permissions, NewRole, NewUser, Role, RoleName, User,
};
use warden_core::{RoleId, UserId};

use super::r#trait::{IdentityStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_identity.sql");

/// Postgres-backed identity store.
///
/// Tables: `users`, `roles` (permissions stored in their canonical JSON-array
/// text form) and the `user_roles` join table.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Attach roles to already loaded user rows (one query for the whole page).
    async fn load_roles(&self, rows: Vec<UserRow>) -> Result<Vec<User>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let role_rows = sqlx::query(
            r#"
            SELECT ur.user_id, r.id, r.name, r.permissions
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = ANY($1)
            ORDER BY r.id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_roles", e))?;

        let mut by_user: HashMap<Uuid, Vec<Role>> = HashMap::new();
        for row in &role_rows {
            let user_id: Uuid = row
                .try_get("user_id")
                .map_err(|e| map_sqlx_error("load_roles", e))?;
            by_user.entry(user_id).or_default().push(role_from_row(row)?);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let roles = by_user.remove(&row.id).unwrap_or_default();
                row.into_user(roles)
            })
            .collect())
    }

    async fn find_user_where(
        &self,
        operation: &'static str,
        sql: &'static str,
        bind: UserKey<'_>,
    ) -> Result<Option<User>, StoreError> {
        let query = sqlx::query(sql);
        let query = match bind {
            UserKey::Id(id) => query.bind(id),
            UserKey::Email(email) => query.bind(email.to_string()),
        };
        let row = query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        match row {
            Some(row) => {
                let row = UserRow::from_row(&row).map_err(|e| map_sqlx_error(operation, e))?;
                Ok(self.load_roles(vec![row]).await?.pop())
            }
            None => Ok(None),
        }
    }
}

enum UserKey<'a> {
    Id(Uuid),
    Email(&'a str),
}

struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_user(self, roles: Vec<Role>) -> User {
        User {
            id: UserId::from_uuid(self.id),
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
            roles,
        }
    }
}

fn role_from_row(row: &PgRow) -> Result<Role, StoreError> {
    let id: i32 = row.try_get("id").map_err(|e| map_sqlx_error("decode_role", e))?;
    let name: String = row.try_get("name").map_err(|e| map_sqlx_error("decode_role", e))?;
    let raw: String = row
        .try_get("permissions")
        .map_err(|e| map_sqlx_error("decode_role", e))?;
    let permissions = deserialize_permissions(&raw)
        .map_err(|e| StoreError::Corrupt(format!("role {id}: {e}")))?;

    Ok(Role {
        id: RoleId::new(id),
        name: RoleName::new(name),
        permissions,
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Unique constraint on `roles.name` as created by the schema.
const ROLE_NAME_KEY: &str = "roles_name_key";

/// Explicit ids bypass `roles_id_seq`. Moves it up to the highest id without
/// ever lowering a value already handed out by `nextval`.
const ADVANCE_ROLE_SEQUENCE: &str = r#"
SELECT setval(
    'roles_id_seq',
    GREATEST((SELECT MAX(id) FROM roles), (SELECT last_value FROM roles_id_seq))
)
"#;

/// Connect-or-create inside an open transaction.
async fn upsert_role(tx: &mut Transaction<'_, Postgres>, role: &Role) -> Result<Role, StoreError> {
    let permissions = serialize_permissions(&role.permissions)
        .map_err(|e| StoreError::Corrupt(format!("role {}: {e}", role.id)))?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO roles (id, name, permissions)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(role.id.get())
    .bind(role.name.as_str())
    .bind(permissions)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("upsert_role", e))?
    .rows_affected();

    if inserted > 0 {
        sqlx::query(ADVANCE_ROLE_SEQUENCE)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_role", e))?;
    }

    let row = sqlx::query(
        r#"
        SELECT id, name, permissions
        FROM roles
        WHERE id = $1 OR name = $2
        ORDER BY (id = $1) DESC
        LIMIT 1
        "#,
    )
    .bind(role.id.get())
    .bind(role.name.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("upsert_role", e))?;

    role_from_row(&row)
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self, email), err)]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_user_where(
            "find_user_by_email",
            r#"
            SELECT id, email, password_hash, first_name, last_name, created_at
            FROM users
            WHERE email = $1
            "#,
            UserKey::Email(email),
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.find_user_where(
            "find_user_by_id",
            r#"
            SELECT id, email, password_hash, first_name, last_name, created_at
            FROM users
            WHERE id = $1
            "#,
            UserKey::Id(*id.as_uuid()),
        )
        .await
    }

    #[instrument(skip(self, user, default_role), fields(user_id = %user.id), err)]
    async fn create_user(&self, user: NewUser, default_role: &Role) -> Result<User, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let role = upsert_role(&mut tx, default_role).await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match map_sqlx_error("create_user", e) {
            StoreError::Conflict(_) => StoreError::Conflict("email already registered".to_string()),
            other => other,
        })?;

        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user.id.as_uuid())
            .bind(role.id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_user", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(User {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: user.created_at,
            roles: vec![role],
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id, role_id = %role_id), err)]
    async fn connect_user_role(&self, user_id: UserId, role_id: RoleId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id.as_uuid())
            .bind(role_id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
                    if db.constraint().is_some_and(|c| c.contains("role_id")) {
                        StoreError::NotFound(format!("role {role_id}"))
                    } else {
                        StoreError::NotFound(format!("user {user_id}"))
                    }
                }
                other => map_sqlx_error("connect_user_role", other),
            })?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn count_users(&self) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;
        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self, limit: u64, skip: u64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, email, password_hash, first_name, last_name, created_at
            FROM users
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(to_i64(limit))
        .bind(to_i64(skip))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_users", e))?;

        let rows = rows
            .iter()
            .map(UserRow::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_users", e))?;
        self.load_roles(rows).await
    }

    #[instrument(skip(self, role), fields(role = %role.name), err)]
    async fn create_role(&self, role: NewRole) -> Result<Role, StoreError> {
        let permissions = serialize_permissions(&role.permissions)
            .map_err(|e| StoreError::Corrupt(format!("role '{}': {e}", role.name)))?;

        let row = sqlx::query(
            r#"
            INSERT INTO roles (name, permissions)
            VALUES ($1, $2)
            RETURNING id, name, permissions
            "#,
        )
        .bind(role.name.as_str())
        .bind(permissions)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                role_unique_violation(&role.name, db.constraint())
            }
            other => map_sqlx_error("create_role", other),
        })?;

        role_from_row(&row)
    }

    #[instrument(skip(self, role), fields(role = %role.name), err)]
    async fn connect_or_create_role(&self, role: &Role) -> Result<Role, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let role = upsert_role(&mut tx, role).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(role)
    }

    #[instrument(skip(self), err)]
    async fn count_roles(&self) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_roles", e))?;
        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self), err)]
    async fn list_roles(&self, limit: u64, skip: u64) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, permissions
            FROM roles
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(to_i64(limit))
        .bind(to_i64(skip))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_roles", e))?;

        rows.iter().map(role_from_row).collect()
    }
}

/// Only a clash on the name is a duplicate role; any other unique violation
/// means the id sequence handed out a taken id.
fn role_unique_violation(name: &RoleName, constraint: Option<&str>) -> StoreError {
    if constraint == Some(ROLE_NAME_KEY) {
        StoreError::Conflict(format!("role '{name}' already exists"))
    } else {
        StoreError::Backend(format!(
            "unique violation in create_role on {}",
            constraint.unwrap_or("unnamed constraint")
        ))
    }
}

/// Map SQLx errors to StoreError, using PostgreSQL error codes.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // unique violation
                Some("23505") => StoreError::Conflict(msg),
                // foreign key violation
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_is_a_conflict() {
        let err = role_unique_violation(&RoleName::new("auditor"), Some(ROLE_NAME_KEY));
        assert_eq!(err, StoreError::Conflict("role 'auditor' already exists".to_string()));
    }

    #[test]
    fn primary_key_collision_is_not_reported_as_duplicate_name() {
        let err = role_unique_violation(&RoleName::new("auditor"), Some("roles_pkey"));
        assert!(matches!(err, StoreError::Backend(ref msg) if msg.contains("roles_pkey")), "{err:?}");

        let err = role_unique_violation(&RoleName::new("auditor"), None);
        assert!(matches!(err, StoreError::Backend(_)), "{err:?}");
    }

    #[test]
    fn sequence_advance_never_goes_below_last_value() {
        let sql = ADVANCE_ROLE_SEQUENCE.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(sql.contains("GREATEST((SELECT MAX(id) FROM roles), (SELECT last_value FROM roles_id_seq))"));
        assert!(sql.starts_with("SELECT setval( 'roles_id_seq',"));
    }

    #[test]
    fn role_name_key_matches_schema() {
        let schema = SCHEMA.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(schema.contains("CREATE TABLE IF NOT EXISTS roles ( id SERIAL PRIMARY KEY, name TEXT NOT NULL UNIQUE,"));
    }
}
