//! Service boundaries implemented over a store.
//!
//! Handed to the HTTP layer as `Arc<dyn Trait>`; implementations decide
//! where data lives.

use warden_core::{PermissionId, RoleId, UserId};

use crate::claims::IdentityClaims;
use crate::error::AuthResult;
use crate::permissions::{NewPermission, Permission, PermissionType};
use crate::roles::{NewRole, Role};
use crate::user::{User, UserProfile};

/// Credential checks and account creation.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify credentials for an active user and stamp its last login.
    ///
    /// Unknown, inactive, and wrong-password cases are indistinguishable
    /// (`InvalidCredentials`).
    async fn authenticate(&self, username: &str, password: &str) -> AuthResult<User>;

    /// Create an active account with no email.
    async fn register(&self, username: &str, password: &str) -> AuthResult<User>;

    async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()>;

    /// Create an account from administrator-supplied details and link it to
    /// each distinct role in `role_ids`.
    async fn register_with_roles(
        &self,
        profile: UserProfile,
        password: &str,
        role_ids: &[RoleId],
    ) -> AuthResult<User>;
}

/// Role and permission lookups.
#[async_trait::async_trait]
pub trait PermissionResolver: Send + Sync {
    async fn user_roles(&self, user_id: UserId) -> AuthResult<Vec<Role>>;

    async fn role_permissions(&self, role_id: RoleId) -> AuthResult<Vec<Permission>>;

    /// Union of the permissions of every role the user holds, one entry per
    /// permission id.
    async fn user_permissions(&self, user_id: UserId) -> AuthResult<Vec<Permission>>;

    /// Whether any of the user's permissions covers `resource_uri` for `kind`.
    async fn has_permission(
        &self,
        user_id: UserId,
        resource_uri: &str,
        kind: PermissionType,
    ) -> AuthResult<bool> {
        Ok(self
            .user_permissions(user_id)
            .await?
            .iter()
            .any(|p| p.covers(resource_uri, kind)))
    }

    /// Make the role's permission set exactly `permission_ids`.
    async fn update_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AuthResult<()>;

    /// Resolve the user's grants and build a fresh claim set.
    async fn build_identity(&self, user: &User) -> AuthResult<IdentityClaims>;
}

/// Record management for users, roles, and permissions.
#[async_trait::async_trait]
pub trait RbacAdmin: Send + Sync {
    async fn list_users(&self) -> AuthResult<Vec<User>>;
    async fn get_user(&self, id: UserId) -> AuthResult<User>;
    /// Replace username, email, and active flag. The password is untouched.
    async fn update_user(&self, id: UserId, profile: UserProfile) -> AuthResult<User>;
    async fn delete_user(&self, id: UserId) -> AuthResult<()>;
    /// Make the user's role set exactly `role_ids`.
    async fn assign_user_roles(&self, id: UserId, role_ids: &[RoleId]) -> AuthResult<()>;

    async fn list_roles(&self) -> AuthResult<Vec<Role>>;
    async fn get_role(&self, id: RoleId) -> AuthResult<Role>;
    async fn create_role(&self, role: NewRole) -> AuthResult<Role>;
    async fn update_role(&self, id: RoleId, role: NewRole) -> AuthResult<Role>;
    async fn delete_role(&self, id: RoleId) -> AuthResult<()>;

    async fn list_permissions(&self) -> AuthResult<Vec<Permission>>;
    async fn get_permission(&self, id: PermissionId) -> AuthResult<Permission>;
    async fn create_permission(&self, permission: NewPermission) -> AuthResult<Permission>;
    async fn update_permission(
        &self,
        id: PermissionId,
        permission: NewPermission,
    ) -> AuthResult<Permission>;
    async fn delete_permission(&self, id: PermissionId) -> AuthResult<()>;
}
