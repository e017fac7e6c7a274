use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warden_auth::{AuthError, AuthResult};

/// Serialize `result` with `status` on success, map the error otherwise.
pub fn json_result<T: serde::Serialize>(
    status: StatusCode,
    result: AuthResult<T>,
) -> axum::response::Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(e) => auth_error_to_response(e),
    }
}

/// `204 No Content` on success, map the error otherwise.
pub fn empty_result(result: AuthResult<()>) -> axum::response::Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => auth_error_to_response(e),
    }
}

pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        AuthError::AlreadyExists => json_error(StatusCode::CONFLICT, "already_exists", err.to_string()),
        AuthError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", err.to_string())
        }
        AuthError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AuthError::RegistrationFailed => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "registration_failed",
            err.to_string(),
        ),
        AuthError::Storage(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            "storage unavailable",
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
