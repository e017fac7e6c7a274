//! API-side authorization guard for admin routes.
//!
//! Embedded claims can be up to a session lifetime old, so admin routes ask
//! the resolver instead.

use axum::http::StatusCode;
use axum::response::Response;
use tracing::warn;

use warden_auth::{PermissionResolver, PermissionType};

use crate::app::errors::{auth_error_to_response, json_error};
use crate::context::SessionContext;

/// Page URIs guarding each admin area.
pub const USERS_PAGE: &str = "/users";
pub const ROLES_PAGE: &str = "/admin/roles";
pub const PERMISSIONS_PAGE: &str = "/permissions";

/// Check that the session's user currently holds a Page permission on `uri`.
pub async fn require_page(
    resolver: &dyn PermissionResolver,
    session: &SessionContext,
    uri: &str,
) -> Result<(), Response> {
    match resolver
        .has_permission(session.user_id(), uri, PermissionType::Page)
        .await
    {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(user_id = %session.user_id(), resource = uri, "access denied");
            Err(json_error(
                StatusCode::FORBIDDEN,
                "forbidden",
                format!("missing permission for '{uri}'"),
            ))
        }
        Err(e) => Err(auth_error_to_response(e)),
    }
}
