use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use warden_auth::{explain_authorization, PermissionType};

use crate::app::dto::{AuthorizeQuery, AuthorizeResponse, IdentityResponse};
use crate::app::errors::{auth_error_to_response, json_error};
use crate::app::services::AppServices;
use crate::context::SessionContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /whoami - claims carried by the current session
pub async fn whoami(Extension(session): Extension<SessionContext>) -> impl IntoResponse {
    Json(IdentityResponse::from(session.claims().clone()))
}

/// GET /authorize?resource=..&type=.. - check the current user against live grants
pub async fn authorize(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<AuthorizeQuery>,
) -> axum::response::Response {
    let kind = match query.kind.as_deref() {
        None => PermissionType::default(),
        Some(raw) => match raw.parse::<PermissionType>() {
            Ok(kind) => kind,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_permission_type", e.to_string()),
        },
    };

    let granted = match services
        .resolver
        .has_permission(session.user_id(), &query.resource, kind)
        .await
    {
        Ok(granted) => granted,
        Err(e) => return auth_error_to_response(e),
    };

    let body = AuthorizeResponse {
        session: explain_authorization(session.principal(), &query.resource),
        resource: query.resource,
        kind,
        granted,
    };
    (StatusCode::OK, Json(body)).into_response()
}
