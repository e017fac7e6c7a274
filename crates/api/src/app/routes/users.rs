//! User administration, guarded by the `/users` page permission.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use warden_auth::UserProfile;
use warden_core::UserId;

use crate::app::dto::{AssignRolesRequest, CreateUserRequest};
use crate::app::errors::{auth_error_to_response, empty_result, json_result};
use crate::app::services::AppServices;
use crate::authz::{require_page, USERS_PAGE};
use crate::context::SessionContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/roles", get(user_roles).put(assign_roles))
        .route("/:id/permissions", get(user_permissions))
}

/// GET /users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, USERS_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.list_users().await)
}

/// POST /users - create an account with an initial role set
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<CreateUserRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, USERS_PAGE).await {
        return resp;
    }
    let result = services
        .authenticator
        .register_with_roles(req.profile, &req.password, &req.role_ids)
        .await;
    json_result(StatusCode::CREATED, result)
}

/// GET /users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<UserId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, USERS_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.get_user(id).await)
}

/// PUT /users/:id - replace username, email, and active flag
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<UserId>,
    Json(profile): Json<UserProfile>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, USERS_PAGE).await {
        return resp;
    }
    json_result(StatusCode::OK, services.admin.update_user(id, profile).await)
}

/// DELETE /users/:id
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<UserId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, USERS_PAGE).await {
        return resp;
    }
    empty_result(services.admin.delete_user(id).await)
}

/// GET /users/:id/roles
pub async fn user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<UserId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, USERS_PAGE).await {
        return resp;
    }
    if let Err(e) = services.admin.get_user(id).await {
        return auth_error_to_response(e);
    }
    json_result(StatusCode::OK, services.resolver.user_roles(id).await)
}

/// PUT /users/:id/roles - replace the user's role set
pub async fn assign_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<UserId>,
    Json(req): Json<AssignRolesRequest>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, USERS_PAGE).await {
        return resp;
    }
    empty_result(services.admin.assign_user_roles(id, &req.role_ids).await)
}

/// GET /users/:id/permissions - effective permissions through all roles
pub async fn user_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Path(id): Path<UserId>,
) -> axum::response::Response {
    if let Err(resp) = require_page(services.resolver.as_ref(), &session, USERS_PAGE).await {
        return resp;
    }
    if let Err(e) = services.admin.get_user(id).await {
        return auth_error_to_response(e);
    }
    json_result(StatusCode::OK, services.resolver.user_permissions(id).await)
}
