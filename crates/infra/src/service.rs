use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use warden_auth::{
    build_identity, hash_password, verify_password, AuthError, AuthResult, Authenticator,
    IdentityClaims, NewPermission, NewRole, NewUser, Permission, PermissionDiff, PermissionResolver,
    RbacAdmin, Role, SessionPolicy, User, UserProfile,
};
use warden_core::{require_non_blank, PermissionId, RoleId, UserId};

use crate::store::{RbacStore, StoreError};

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(_) => AuthError::AlreadyExists,
            StoreError::MissingReference(_) => AuthError::NotFound,
            StoreError::Backend(msg) => AuthError::Storage(msg),
        }
    }
}

/// Authenticator, resolver, and admin operations over one store.
#[derive(Clone)]
pub struct RbacService {
    store: Arc<dyn RbacStore>,
    policy: SessionPolicy,
}

impl RbacService {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self {
            store,
            policy: SessionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn RbacStore> {
        &self.store
    }

    async fn ensure_username_free(&self, username: &str) -> AuthResult<()> {
        match self.store.find_user_by_username(username).await? {
            Some(_) => Err(AuthError::AlreadyExists),
            None => Ok(()),
        }
    }
}

fn require_password(field: &'static str, password: &str) -> AuthResult<()> {
    if password.is_empty() {
        return Err(AuthError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn distinct<T: Copy + Ord>(ids: &[T]) -> Vec<T> {
    let mut out = ids.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

#[async_trait::async_trait]
impl Authenticator for RbacService {
    async fn authenticate(&self, username: &str, password: &str) -> AuthResult<User> {
        let user = match self.store.find_user_by_username(username).await? {
            Some(user) if user.can_authenticate() && verify_password(password, &user.password_hash) => user,
            _ => {
                warn!(username, "login rejected");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let user = self
            .store
            .record_login(user.id, Utc::now())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        info!(user_id = %user.id, username = %user.username, "login succeeded");
        Ok(user)
    }

    async fn register(&self, username: &str, password: &str) -> AuthResult<User> {
        require_non_blank("username", username)?;
        require_password("password", password)?;
        self.ensure_username_free(username).await?;

        let new_user = NewUser::active(username, hash_password(password), Utc::now());
        match self.store.insert_user(new_user, &[]).await {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, "user registered");
                Ok(user)
            }
            Err(StoreError::Conflict(_)) => Err(AuthError::AlreadyExists),
            Err(e) => {
                error!(username, error = %e, "registration failed");
                Err(AuthError::RegistrationFailed)
            }
        }
    }

    async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        let user = self.store.find_user(user_id).await?.ok_or(AuthError::NotFound)?;
        if !verify_password(old_password, &user.password_hash) {
            warn!(user_id = %user_id, "password change rejected");
            return Err(AuthError::InvalidCredentials);
        }
        require_password("new password", new_password)?;

        if !self.store.set_password_hash(user_id, &hash_password(new_password)).await? {
            return Err(AuthError::NotFound);
        }
        info!(user_id = %user_id, "password changed");
        Ok(())
    }

    async fn register_with_roles(
        &self,
        profile: UserProfile,
        password: &str,
        role_ids: &[RoleId],
    ) -> AuthResult<User> {
        profile.validate()?;
        require_password("password", password)?;
        self.ensure_username_free(&profile.username).await?;

        let new_user = NewUser {
            username: profile.username,
            password_hash: hash_password(password),
            email: profile.email,
            is_active: profile.is_active,
            created_at: Utc::now(),
        };
        let user = self.store.insert_user(new_user, &distinct(role_ids)).await?;
        info!(user_id = %user.id, username = %user.username, roles = ?role_ids, "user created");
        Ok(user)
    }
}

#[async_trait::async_trait]
impl PermissionResolver for RbacService {
    async fn user_roles(&self, user_id: UserId) -> AuthResult<Vec<Role>> {
        Ok(self.store.roles_for_user(user_id).await?)
    }

    async fn role_permissions(&self, role_id: RoleId) -> AuthResult<Vec<Permission>> {
        Ok(self.store.permissions_for_role(role_id).await?)
    }

    async fn user_permissions(&self, user_id: UserId) -> AuthResult<Vec<Permission>> {
        let mut by_id: BTreeMap<PermissionId, Permission> = BTreeMap::new();
        for role in self.user_roles(user_id).await? {
            for permission in self.role_permissions(role.id).await? {
                by_id.entry(permission.id).or_insert(permission);
            }
        }
        Ok(by_id.into_values().collect())
    }

    async fn update_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: &[PermissionId],
    ) -> AuthResult<()> {
        if self.store.find_role(role_id).await?.is_none() {
            return Err(AuthError::NotFound);
        }

        let current: Vec<PermissionId> = self
            .store
            .permissions_for_role(role_id)
            .await?
            .iter()
            .map(|p| p.id)
            .collect();
        let diff = PermissionDiff::compute(&current, permission_ids);
        if diff.is_empty() {
            return Ok(());
        }

        self.store.apply_permission_diff(role_id, &diff).await?;
        info!(
            role_id = %role_id,
            removed = ?diff.to_remove,
            added = ?diff.to_add,
            "role permissions updated"
        );
        Ok(())
    }

    async fn build_identity(&self, user: &User) -> AuthResult<IdentityClaims> {
        let roles = self.user_roles(user.id).await?;
        let permissions = self.user_permissions(user.id).await?;
        Ok(build_identity(user, &roles, &permissions, &self.policy, Utc::now()))
    }
}

#[async_trait::async_trait]
impl RbacAdmin for RbacService {
    async fn list_users(&self) -> AuthResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    async fn get_user(&self, id: UserId) -> AuthResult<User> {
        self.store.find_user(id).await?.ok_or(AuthError::NotFound)
    }

    async fn update_user(&self, id: UserId, profile: UserProfile) -> AuthResult<User> {
        profile.validate()?;
        self.store
            .update_user(id, &profile)
            .await?
            .ok_or(AuthError::NotFound)
    }

    async fn delete_user(&self, id: UserId) -> AuthResult<()> {
        if !self.store.delete_user(id).await? {
            return Err(AuthError::NotFound);
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn assign_user_roles(&self, id: UserId, role_ids: &[RoleId]) -> AuthResult<()> {
        self.store.set_user_roles(id, &distinct(role_ids)).await?;
        info!(user_id = %id, roles = ?role_ids, "user roles assigned");
        Ok(())
    }

    async fn list_roles(&self) -> AuthResult<Vec<Role>> {
        Ok(self.store.list_roles().await?)
    }

    async fn get_role(&self, id: RoleId) -> AuthResult<Role> {
        self.store.find_role(id).await?.ok_or(AuthError::NotFound)
    }

    async fn create_role(&self, role: NewRole) -> AuthResult<Role> {
        role.validate()?;
        Ok(self.store.insert_role(role).await?)
    }

    async fn update_role(&self, id: RoleId, role: NewRole) -> AuthResult<Role> {
        role.validate()?;
        self.store.update_role(id, &role).await?.ok_or(AuthError::NotFound)
    }

    async fn delete_role(&self, id: RoleId) -> AuthResult<()> {
        if !self.store.delete_role(id).await? {
            return Err(AuthError::NotFound);
        }
        info!(role_id = %id, "role deleted");
        Ok(())
    }

    async fn list_permissions(&self) -> AuthResult<Vec<Permission>> {
        Ok(self.store.list_permissions().await?)
    }

    async fn get_permission(&self, id: PermissionId) -> AuthResult<Permission> {
        self.store.find_permission(id).await?.ok_or(AuthError::NotFound)
    }

    async fn create_permission(&self, permission: NewPermission) -> AuthResult<Permission> {
        permission.validate()?;
        Ok(self.store.insert_permission(permission).await?)
    }

    async fn update_permission(
        &self,
        id: PermissionId,
        permission: NewPermission,
    ) -> AuthResult<Permission> {
        permission.validate()?;
        self.store
            .update_permission(id, &permission)
            .await?
            .ok_or(AuthError::NotFound)
    }

    async fn delete_permission(&self, id: PermissionId) -> AuthResult<()> {
        if !self.store.delete_permission(id).await? {
            return Err(AuthError::NotFound);
        }
        info!(permission_id = %id, "permission deleted");
        Ok(())
    }
}
