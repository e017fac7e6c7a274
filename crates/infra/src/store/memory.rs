use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use warden_auth::{
    NewPermission, NewRole, NewUser, PasswordHash, Permission, PermissionDiff, Role, RolePermission,
    User, UserProfile, UserRole,
};
use warden_core::{PermissionId, RoleId, UserId};

use super::{RbacStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    user_roles: BTreeSet<UserRole>,
    role_permissions: BTreeSet<RolePermission>,
    last_user_id: i64,
    last_role_id: i64,
    last_permission_id: i64,
}

impl Tables {
    fn username_taken(&self, username: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn require_roles(&self, role_ids: &[RoleId]) -> Result<(), StoreError> {
        match role_ids.iter().find(|id| !self.roles.contains_key(*id)) {
            Some(id) => Err(StoreError::MissingReference(format!("role {id}"))),
            None => Ok(()),
        }
    }
}

/// In-memory RBAC store.
///
/// Intended for tests/dev. Each table is an id-keyed arena; the join tables
/// are ordered sets of id pairs, so a pair is linked at most once.
#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    tables: RwLock<Tables>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn insert_user(&self, user: NewUser, role_ids: &[RoleId]) -> Result<User, StoreError> {
        let mut t = self.write()?;
        if t.username_taken(&user.username, None) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        t.require_roles(role_ids)?;

        t.last_user_id += 1;
        let id = UserId::new(t.last_user_id);
        let user = user.into_user(id);
        t.users.insert(id, user.clone());
        for &role_id in role_ids {
            t.user_roles.insert(UserRole { user_id: id, role_id });
        }
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    async fn update_user(&self, id: UserId, profile: &UserProfile) -> Result<Option<User>, StoreError> {
        let mut t = self.write()?;
        if !t.users.contains_key(&id) {
            return Ok(None);
        }
        if t.username_taken(&profile.username, Some(id)) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                profile.username
            )));
        }
        let Some(user) = t.users.get_mut(&id) else {
            return Ok(None);
        };
        user.username = profile.username.clone();
        user.email = profile.email.clone();
        user.is_active = profile.is_active;
        Ok(Some(user.clone()))
    }

    async fn set_password_hash(&self, id: UserId, hash: &PasswordHash) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        match t.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = hash.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<Option<User>, StoreError> {
        let mut t = self.write()?;
        Ok(t.users.get_mut(&id).map(|user| {
            user.last_login = Some(at);
            user.clone()
        }))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        if t.users.remove(&id).is_none() {
            return Ok(false);
        }
        t.user_roles.retain(|link| link.user_id != id);
        Ok(true)
    }

    async fn set_user_roles(&self, id: UserId, role_ids: &[RoleId]) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if !t.users.contains_key(&id) {
            return Err(StoreError::MissingReference(format!("user {id}")));
        }
        t.require_roles(role_ids)?;

        t.user_roles.retain(|link| link.user_id != id);
        for &role_id in role_ids {
            t.user_roles.insert(UserRole { user_id: id, role_id });
        }
        Ok(())
    }

    async fn insert_role(&self, role: NewRole) -> Result<Role, StoreError> {
        let mut t = self.write()?;
        t.last_role_id += 1;
        let id = RoleId::new(t.last_role_id);
        let role = role.into_role(id);
        t.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    async fn update_role(&self, id: RoleId, role: &NewRole) -> Result<Option<Role>, StoreError> {
        let mut t = self.write()?;
        Ok(t.roles.get_mut(&id).map(|existing| {
            existing.name = role.name.clone();
            existing.description = role.description.clone();
            existing.clone()
        }))
    }

    async fn delete_role(&self, id: RoleId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        if t.roles.remove(&id).is_none() {
            return Ok(false);
        }
        t.user_roles.retain(|link| link.role_id != id);
        t.role_permissions.retain(|link| link.role_id != id);
        Ok(true)
    }

    async fn roles_for_user(&self, id: UserId) -> Result<Vec<Role>, StoreError> {
        let t = self.read()?;
        Ok(t.user_roles
            .iter()
            .filter(|link| link.user_id == id)
            .filter_map(|link| t.roles.get(&link.role_id).cloned())
            .collect())
    }

    async fn insert_permission(&self, permission: NewPermission) -> Result<Permission, StoreError> {
        let mut t = self.write()?;
        t.last_permission_id += 1;
        let id = PermissionId::new(t.last_permission_id);
        let permission = permission.into_permission(id);
        t.permissions.insert(id, permission.clone());
        Ok(permission)
    }

    async fn find_permission(&self, id: PermissionId) -> Result<Option<Permission>, StoreError> {
        Ok(self.read()?.permissions.get(&id).cloned())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        Ok(self.read()?.permissions.values().cloned().collect())
    }

    async fn update_permission(
        &self,
        id: PermissionId,
        permission: &NewPermission,
    ) -> Result<Option<Permission>, StoreError> {
        let mut t = self.write()?;
        Ok(t.permissions.get_mut(&id).map(|existing| {
            existing.name = permission.name.clone();
            existing.resource_uri = permission.resource_uri.clone();
            existing.description = permission.description.clone();
            existing.kind = permission.kind;
            existing.clone()
        }))
    }

    async fn delete_permission(&self, id: PermissionId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        if t.permissions.remove(&id).is_none() {
            return Ok(false);
        }
        t.role_permissions.retain(|link| link.permission_id != id);
        Ok(true)
    }

    async fn permissions_for_role(&self, id: RoleId) -> Result<Vec<Permission>, StoreError> {
        let t = self.read()?;
        Ok(t.role_permissions
            .iter()
            .filter(|link| link.role_id == id)
            .filter_map(|link| t.permissions.get(&link.permission_id).cloned())
            .collect())
    }

    async fn apply_permission_diff(&self, id: RoleId, diff: &PermissionDiff) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if !t.roles.contains_key(&id) {
            return Err(StoreError::MissingReference(format!("role {id}")));
        }
        if let Some(missing) = diff.to_add.iter().find(|p| !t.permissions.contains_key(*p)) {
            return Err(StoreError::MissingReference(format!("permission {missing}")));
        }

        for &permission_id in &diff.to_remove {
            t.role_permissions.remove(&RolePermission { role_id: id, permission_id });
        }
        for &permission_id in &diff.to_add {
            t.role_permissions.insert(RolePermission { role_id: id, permission_id });
        }
        Ok(())
    }
}
