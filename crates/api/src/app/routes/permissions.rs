use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use warden_auth::NewPermission;
use warden_core::PermissionId;

use crate::app::errors::{empty_result, json_result};
use crate::app::services::AppServices;
use crate::authz::{require_page, PERMISSIONS_PAGE};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_permissions).post(create_permission))
        .route(
            "/:id",
            get(get_permission).put(update_permission).delete(delete_permission),
        )
}

/// GET /permissions
pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, PERMISSIONS_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.list_permissions().await)
}

/// POST /permissions
pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(permission): Json<NewPermission>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, PERMISSIONS_PAGE).await {
        return resp;
    }
    json_result(StatusCode::CREATED, services.admin.create_permission(permission).await)
}

/// GET /permissions/:id
pub async fn get_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<PermissionId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, PERMISSIONS_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.get_permission(id).await)
}

/// PUT /permissions/:id
pub async fn update_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<PermissionId>,
    Json(permission): Json<NewPermission>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, PERMISSIONS_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.update_permission(id, permission).await)
}

/// DELETE /permissions/:id - also revokes it from every role
pub async fn delete_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<PermissionId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, PERMISSIONS_PAGE).await {
        return resp;
    }
    empty_result(services.admin.delete_permission(id).await)
}
