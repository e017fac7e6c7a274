use axum::{
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod permissions;
pub mod roles;
pub mod system;
pub mod users;

/// Router for all session-protected endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/authorize", get(system::authorize))
        .route("/api/auth/password", post(auth::change_password))
        .nest("/users", users::router())
        .nest("/roles", roles::router())
        .nest("/permissions", permissions::router())
}
