//! Role administration, guarded by the `/admin/roles` page permission.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use warden_auth::NewRole;
use warden_core::RoleId;

use crate::app::dto::SetPermissionsRequest;
use crate::app::errors::{auth_error_to_response, empty_result, json_result};
use crate::app::services::AppServices;
use crate::authz::{require_page, ROLES_PAGE};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/:id", get(get_role).put(update_role).delete(delete_role))
        .route("/:id/permissions", get(role_permissions).put(set_role_permissions))
}

/// GET /roles
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, ROLES_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.list_roles().await)
}

/// POST /roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(role): Json<NewRole>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, ROLES_PAGE).await {
        return resp;
    }
    json_result(StatusCode::CREATED, services.admin.create_role(role).await)
}

/// GET /roles/:id
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<RoleId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, ROLES_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.get_role(id).await)
}

/// PUT /roles/:id
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<RoleId>,
    Json(role): Json<NewRole>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, ROLES_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.update_role(id, role).await)
}

/// DELETE /roles/:id - also drops the role's user and permission links
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<RoleId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, ROLES_PAGE).await {
        return resp;
    }
    empty_result(services.admin.delete_role(id).await)
}

/// GET /roles/:id/permissions
pub async fn role_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<RoleId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, ROLES_PAGE).await {
        return resp;
    }
    if let Err(e) = services.admin.get_role(id).await {
        return auth_error_to_response(e);
    }
    json_result(StatusCode::OK, services.resolver.role_permissions(id).await)
}

/// PUT /roles/:id/permissions - make the role's permission set exactly the given ids
pub async fn set_role_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<RoleId>,
    Json(req): Json<SetPermissionsRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, ROLES_PAGE).await {
        return resp;
    }
    empty_result(
        services
            .resolver
            .update_role_permissions(id, &req.permission_ids)
            .await,
    )
}
