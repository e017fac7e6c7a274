//! Storage port for users, roles, permissions, and their join tables.
//!
//! Engines:
//! - [`memory::InMemoryRbacStore`] for tests/dev
//! - [`postgres::PostgresRbacStore`] for deployments
//!
//! Every method is a single unit of work. Methods that touch more than one
//! table (cascading deletes, link replacement) are atomic in both engines.

use chrono::{DateTime, Utc};
use thiserror::Error;

use warden_auth::{
    NewPermission, NewRole, NewUser, PasswordHash, Permission, PermissionDiff, Role, User,
    UserProfile,
};
use warden_core::{PermissionId, RoleId, UserId};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRbacStore;
pub use postgres::PostgresRbacStore;

/// Storage failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness rule was violated (duplicate username).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A join record would reference a row that does not exist.
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// Anything else: connectivity, decoding, poisoned locks.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence operations the RBAC service needs.
///
/// Lookups return `Option`/`bool` for absence; only broken invariants and
/// backend failures are errors.
#[async_trait::async_trait]
pub trait RbacStore: Send + Sync {
    // users

    /// Insert a user and link it to `role_ids` in one transaction.
    async fn insert_user(&self, user: NewUser, role_ids: &[RoleId]) -> Result<User, StoreError>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    /// Exact, case-sensitive match.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn update_user(&self, id: UserId, profile: &UserProfile) -> Result<Option<User>, StoreError>;
    async fn set_password_hash(&self, id: UserId, hash: &PasswordHash) -> Result<bool, StoreError>;
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<Option<User>, StoreError>;
    /// Delete the user and its role links.
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;
    /// Replace the user's role links with exactly `role_ids`.
    async fn set_user_roles(&self, id: UserId, role_ids: &[RoleId]) -> Result<(), StoreError>;

    // roles

    async fn insert_role(&self, role: NewRole) -> Result<Role, StoreError>;
    async fn find_role(&self, id: RoleId) -> Result<Option<Role>, StoreError>;
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;
    async fn update_role(&self, id: RoleId, role: &NewRole) -> Result<Option<Role>, StoreError>;
    /// Delete the role together with its user and permission links.
    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError>;
    /// Roles linked to the user, ordered by id.
    async fn roles_for_user(&self, id: UserId) -> Result<Vec<Role>, StoreError>;

    // permissions

    async fn insert_permission(&self, permission: NewPermission) -> Result<Permission, StoreError>;
    async fn find_permission(&self, id: PermissionId) -> Result<Option<Permission>, StoreError>;
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;
    async fn update_permission(
        &self,
        id: PermissionId,
        permission: &NewPermission,
    ) -> Result<Option<Permission>, StoreError>;
    /// Delete the permission and its role links.
    async fn delete_permission(&self, id: PermissionId) -> Result<bool, StoreError>;
    /// Permissions linked to the role, ordered by id.
    async fn permissions_for_role(&self, id: RoleId) -> Result<Vec<Permission>, StoreError>;

    /// Apply `diff` to the role's permission links atomically.
    ///
    /// Fails with `MissingReference` (and changes nothing) when the role or
    /// any permission in `diff.to_add` does not exist.
    async fn apply_permission_diff(&self, id: RoleId, diff: &PermissionDiff) -> Result<(), StoreError>;
}
