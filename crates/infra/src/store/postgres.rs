//! Postgres-backed RBAC store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate username |
//! | Database (foreign key violation) | `23503` | `MissingReference` | Link to a nonexistent user/role/permission |
//! | Database (other) | Any other | `Backend` | Check constraints, syntax, permissions |
//! | Other | N/A | `Backend` | Pool closed, network errors, decode failures |
//!
//! Multi-statement operations run in a transaction. Early returns drop the
//! transaction uncommitted, which rolls it back.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use warden_auth::{
    NewPermission, NewRole, NewUser, PasswordHash, Permission, PermissionDiff, PermissionType, Role,
    User, UserProfile,
};
use warden_core::{PermissionId, RoleId, UserId};

use super::{RbacStore, StoreError};

const USER_COLUMNS: &str = "id, username, password_hash, email, is_active, created_at, last_login";
const PERMISSION_COLUMNS: &str = "id, name, resource_uri, description, type";

/// Postgres-backed RBAC store.
///
/// `Send + Sync`; the pool handles connection sharing. Schema lives in
/// `crates/infra/migrations` and is applied by [`PostgresRbacStore::migrate`].
#[derive(Debug, Clone)]
pub struct PostgresRbacStore {
    pool: PgPool,
}

impl PostgresRbacStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

async fn commit(tx: Transaction<'_, Postgres>, operation: &str) -> Result<(), StoreError> {
    tx.commit().await.map_err(|e| map_sqlx_error(operation, e))
}

/// Insert `(owner, linked)` pairs into a join table, skipping pairs that exist.
async fn insert_links(
    tx: &mut Transaction<'_, Postgres>,
    sql: &str,
    owner: i64,
    linked: &[i64],
    operation: &str,
) -> Result<(), StoreError> {
    if linked.is_empty() {
        return Ok(());
    }
    sqlx::query(sql)
        .bind(owner)
        .bind(linked)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?;
    Ok(())
}

const INSERT_USER_ROLES: &str = r#"
    INSERT INTO user_roles (user_id, role_id)
    SELECT $1, UNNEST($2::bigint[])
    ON CONFLICT DO NOTHING
"#;

const INSERT_ROLE_PERMISSIONS: &str = r#"
    INSERT INTO role_permissions (role_id, permission_id)
    SELECT $1, UNNEST($2::bigint[])
    ON CONFLICT DO NOTHING
"#;

fn raw_ids<T: Copy + Into<i64>>(ids: &[T]) -> Vec<i64> {
    ids.iter().map(|&id| id.into()).collect()
}

#[async_trait::async_trait]
impl RbacStore for PostgresRbacStore {
    #[instrument(skip(self, user), fields(username = %user.username, roles = role_ids.len()), err)]
    async fn insert_user(&self, user: NewUser, role_ids: &[RoleId]) -> Result<User, StoreError> {
        let mut tx = self.begin("insert_user").await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (username, password_hash, email, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(user.password_hash.as_str())
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        let created = decode::<UserRow>(&row)?.into_user();

        insert_links(&mut tx, INSERT_USER_ROLES, created.id.get(), &raw_ids(role_ids), "insert_user_roles").await?;
        commit(tx, "insert_user").await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user", e))?;
        row.map(|r| decode::<UserRow>(&r).map(UserRow::into_user)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_username", e))?;
        row.map(|r| decode::<UserRow>(&r).map(UserRow::into_user)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter()
            .map(|r| decode::<UserRow>(r).map(UserRow::into_user))
            .collect()
    }

    #[instrument(skip(self, profile), fields(user_id = %id), err)]
    async fn update_user(&self, id: UserId, profile: &UserProfile) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET username = $2, email = $3, is_active = $4
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(&profile.username)
        .bind(&profile.email)
        .bind(profile.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        row.map(|r| decode::<UserRow>(&r).map(UserRow::into_user)).transpose()
    }

    #[instrument(skip(self, hash), fields(user_id = %id), err)]
    async fn set_password_hash(&self, id: UserId, hash: &PasswordHash) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id.get())
            .bind(hash.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_password_hash", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET last_login = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id.get())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("record_login", e))?;
        row.map(|r| decode::<UserRow>(&r).map(UserRow::into_user)).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let mut tx = self.begin("delete_user").await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_user_roles", e))?;
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;

        commit(tx, "delete_user").await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %id, roles = role_ids.len()), err)]
    async fn set_user_roles(&self, id: UserId, role_ids: &[RoleId]) -> Result<(), StoreError> {
        let mut tx = self.begin("set_user_roles").await?;

        let exists = sqlx::query("SELECT 1 FROM users WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_user_roles", e))?;
        if exists.is_none() {
            return Err(StoreError::MissingReference(format!("user {id}")));
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_user_roles", e))?;
        insert_links(&mut tx, INSERT_USER_ROLES, id.get(), &raw_ids(role_ids), "set_user_roles").await?;

        commit(tx, "set_user_roles").await
    }

    #[instrument(skip(self, role), fields(name = %role.name), err)]
    async fn insert_role(&self, role: NewRole) -> Result<Role, StoreError> {
        let row = sqlx::query(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id, name, description",
        )
        .bind(&role.name)
        .bind(&role.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        decode::<RoleRow>(&row).map(Into::into)
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn find_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role", e))?;
        row.map(|r| decode::<RoleRow>(&r).map(Into::into)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query("SELECT id, name, description FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        rows.iter().map(|r| decode::<RoleRow>(r).map(Into::into)).collect()
    }

    #[instrument(skip(self, role), fields(role_id = %id), err)]
    async fn update_role(&self, id: RoleId, role: &NewRole) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE roles SET name = $2, description = $3
            WHERE id = $1
            RETURNING id, name, description
            "#,
        )
        .bind(id.get())
        .bind(&role.name)
        .bind(&role.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_role", e))?;
        row.map(|r| decode::<RoleRow>(&r).map(Into::into)).transpose()
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let mut tx = self.begin("delete_role").await?;

        for sql in [
            "DELETE FROM user_roles WHERE role_id = $1",
            "DELETE FROM role_permissions WHERE role_id = $1",
        ] {
            sqlx::query(sql)
                .bind(id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_role_links", e))?;
        }
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;

        commit(tx, "delete_role").await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn roles_for_user(&self, id: UserId) -> Result<Vec<Role>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.description
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("roles_for_user", e))?;
        rows.iter().map(|r| decode::<RoleRow>(r).map(Into::into)).collect()
    }

    #[instrument(skip(self, permission), fields(uri = %permission.resource_uri), err)]
    async fn insert_permission(&self, permission: NewPermission) -> Result<Permission, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO permissions (name, resource_uri, description, type)
            VALUES ($1, $2, $3, $4)
            RETURNING {PERMISSION_COLUMNS}
            "#
        ))
        .bind(&permission.name)
        .bind(&permission.resource_uri)
        .bind(&permission.description)
        .bind(permission.kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_permission", e))?;
        decode::<PermissionRow>(&row).map(Into::into)
    }

    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn find_permission(&self, id: PermissionId) -> Result<Option<Permission>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_permission", e))?;
        row.map(|r| decode::<PermissionRow>(&r).map(Into::into)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_permissions", e))?;
        rows.iter().map(|r| decode::<PermissionRow>(r).map(Into::into)).collect()
    }

    #[instrument(skip(self, permission), fields(permission_id = %id), err)]
    async fn update_permission(
        &self,
        id: PermissionId,
        permission: &NewPermission,
    ) -> Result<Option<Permission>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE permissions
            SET name = $2, resource_uri = $3, description = $4, type = $5
            WHERE id = $1
            RETURNING {PERMISSION_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(&permission.name)
        .bind(&permission.resource_uri)
        .bind(&permission.description)
        .bind(permission.kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_permission", e))?;
        row.map(|r| decode::<PermissionRow>(&r).map(Into::into)).transpose()
    }

    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn delete_permission(&self, id: PermissionId) -> Result<bool, StoreError> {
        let mut tx = self.begin("delete_permission").await?;

        sqlx::query("DELETE FROM role_permissions WHERE permission_id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_permission_links", e))?;
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_permission", e))?;

        commit(tx, "delete_permission").await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn permissions_for_role(&self, id: RoleId) -> Result<Vec<Permission>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.name, p.resource_uri, p.description, p.type
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("permissions_for_role", e))?;
        rows.iter().map(|r| decode::<PermissionRow>(r).map(Into::into)).collect()
    }

    #[instrument(
        skip(self, diff),
        fields(role_id = %id, removed = diff.to_remove.len(), added = diff.to_add.len()),
        err
    )]
    async fn apply_permission_diff(&self, id: RoleId, diff: &PermissionDiff) -> Result<(), StoreError> {
        let mut tx = self.begin("apply_permission_diff").await?;

        let exists = sqlx::query("SELECT 1 FROM roles WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("apply_permission_diff", e))?;
        if exists.is_none() {
            return Err(StoreError::MissingReference(format!("role {id}")));
        }

        if !diff.to_remove.is_empty() {
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = ANY($2)")
                .bind(id.get())
                .bind(raw_ids(&diff.to_remove))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("remove_role_permissions", e))?;
        }
        insert_links(
            &mut tx,
            INSERT_ROLE_PERMISSIONS,
            id.get(),
            &raw_ids(&diff.to_add),
            "add_role_permissions",
        )
        .await?;

        commit(tx, "apply_permission_diff").await
    }
}

/// Map SQLx errors to `StoreError` with operation context.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::MissingReference(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Backend(format!("sqlx error in {}: {}", operation, other)),
    }
}

fn decode<'r, T: FromRow<'r, PgRow>>(row: &'r PgRow) -> Result<T, StoreError> {
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

// SQLx row types

#[derive(Debug)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
    email: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            email: row.try_get("email")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            last_login: row.try_get("last_login")?,
        })
    }
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: UserId::new(self.id),
            username: self.username,
            password_hash: PasswordHash::from_stored(self.password_hash),
            email: self.email,
            is_active: self.is_active,
            created_at: self.created_at,
            last_login: self.last_login,
        }
    }
}

#[derive(Debug)]
struct RoleRow {
    id: i64,
    name: String,
    description: String,
}

impl<'r> FromRow<'r, PgRow> for RoleRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(RoleRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
        })
    }
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: RoleId::new(row.id),
            name: row.name,
            description: row.description,
        }
    }
}

#[derive(Debug)]
struct PermissionRow {
    id: i64,
    name: String,
    resource_uri: String,
    description: String,
    kind: PermissionType,
}

impl<'r> FromRow<'r, PgRow> for PermissionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("type")?;
        Ok(PermissionRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            resource_uri: row.try_get("resource_uri")?,
            description: row.try_get("description")?,
            kind: kind.parse().map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        })
    }
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: PermissionId::new(row.id),
            name: row.name,
            resource_uri: row.resource_uri,
            description: row.description,
            kind: row.kind,
        }
    }
}
