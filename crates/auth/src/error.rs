use thiserror::Error;

use warden_core::DomainError;

/// Failure of an authentication, resolution, or administration call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The addressed user, role, or permission does not exist.
    #[error("not found")]
    NotFound,

    /// The username (or other unique key) is already taken.
    #[error("already exists")]
    AlreadyExists,

    /// Unknown/inactive user or wrong password. Deliberately does not say which.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Registration failed for a reason other than a duplicate username.
    #[error("registration failed")]
    RegistrationFailed,

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => AuthError::Validation(msg),
            other => AuthError::Validation(other.to_string()),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
