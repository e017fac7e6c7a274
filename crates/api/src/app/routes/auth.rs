//! Login, logout, registration, and password changes.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::app::dto::{ChangePasswordRequest, CredentialsRequest, IdentityResponse};
use crate::app::errors::{auth_error_to_response, json_error};
use crate::app::services::AppServices;
use crate::context::SessionContext;

/// POST /api/auth/login - verify credentials and start a session
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<CredentialsRequest>,
) -> axum::response::Response {
    let user = match services
        .authenticator
        .authenticate(&req.username, &req.password)
        .await
    {
        Ok(user) => user,
        Err(e) => return auth_error_to_response(e),
    };

    let claims = match services.resolver.build_identity(&user).await {
        Ok(claims) => claims,
        Err(e) => return auth_error_to_response(e),
    };
    let cookie = match services.session.issue(&claims) {
        Ok(cookie) => cookie,
        Err(resp) => return resp,
    };

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(IdentityResponse::from(claims)),
    )
        .into_response()
}

/// POST /api/auth/register - self-service account creation
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<CredentialsRequest>,
) -> axum::response::Response {
    match services.authenticator.register(&req.username, &req.password).await {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => auth_error_to_response(e),
    }
}

/// POST /api/auth/logout - drop the session cookie
pub async fn logout(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match HeaderValue::from_str(&services.session.clear_cookie()) {
        Ok(cookie) => (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response(),
        Err(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "session_error",
            "failed to clear session",
        ),
    }
}

/// POST /api/auth/password - change the current user's password
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> axum::response::Response {
    match services
        .authenticator
        .change_password(session.user_id(), &req.old_password, &req.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => auth_error_to_response(e),
    }
}
