//! First-run bootstrap data.

use tracing::info;

use warden_auth::{
    AuthError, AuthResult, Authenticator, NewPermission, NewRole, PermissionResolver, PermissionType,
    RbacAdmin, UserProfile,
};

use crate::config::BootstrapAdmin;
use crate::service::RbacService;

pub const ADMIN_ROLE: &str = "admin";
pub const STANDARD_ROLE: &str = "standard user";

/// Home page, user management, role management, permission management.
pub const DEFAULT_PAGES: [(&str, &str, &str); 4] = [
    ("home", "/", "Access the home page"),
    ("user management", "/users", "Manage user accounts"),
    ("role management", "/admin/roles", "Manage roles"),
    ("permission management", "/permissions", "Manage permissions"),
];

/// What a seeding pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: usize,
    pub permissions_created: usize,
    pub admin_created: bool,
}

/// Create the default roles and page permissions if no roles exist yet.
///
/// The admin role is granted every default page; the standard user role is
/// granted the home page.
pub async fn seed_defaults(service: &RbacService) -> AuthResult<SeedReport> {
    if !service.list_roles().await?.is_empty() {
        return Ok(SeedReport::default());
    }

    let admin = service
        .create_role(NewRole::new(ADMIN_ROLE, "System administrator with every permission"))
        .await?;
    let standard = service
        .create_role(NewRole::new(STANDARD_ROLE, "Regular user with basic access"))
        .await?;

    let mut pages = Vec::with_capacity(DEFAULT_PAGES.len());
    for (name, uri, description) in DEFAULT_PAGES {
        let permission = service
            .create_permission(NewPermission::new(name, uri, PermissionType::Page).with_description(description))
            .await?;
        pages.push(permission.id);
    }

    service.update_role_permissions(admin.id, &pages).await?;
    service.update_role_permissions(standard.id, &pages[..1]).await?;

    info!(roles = 2, permissions = pages.len(), "seeded default roles and permissions");
    Ok(SeedReport {
        roles_created: 2,
        permissions_created: pages.len(),
        admin_created: false,
    })
}

/// Register `admin` with the admin role unless the username is taken.
pub async fn ensure_admin(service: &RbacService, admin: &BootstrapAdmin) -> AuthResult<bool> {
    let roles = service.list_roles().await?;
    let Some(role) = roles.iter().find(|r| r.name == ADMIN_ROLE) else {
        return Err(AuthError::NotFound);
    };

    let profile = UserProfile {
        username: admin.username.clone(),
        email: String::new(),
        is_active: true,
    };
    match service.register_with_roles(profile, &admin.password, &[role.id]).await {
        Ok(user) => {
            info!(user_id = %user.id, username = %user.username, "bootstrap administrator created");
            Ok(true)
        }
        Err(AuthError::AlreadyExists) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Seed defaults (when enabled) and the optional bootstrap administrator.
pub async fn bootstrap(
    service: &RbacService,
    seed: bool,
    admin: Option<&BootstrapAdmin>,
) -> AuthResult<SeedReport> {
    let mut report = if seed {
        seed_defaults(service).await?
    } else {
        SeedReport::default()
    };
    if let Some(admin) = admin {
        report.admin_created = ensure_admin(service, admin).await?;
    }
    Ok(report)
}
