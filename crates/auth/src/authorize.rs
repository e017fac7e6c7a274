use serde::Serialize;
use thiserror::Error;

use warden_core::UserId;

use crate::claims::IdentityClaims;
use crate::permissions::uri_eq;

/// An authenticated caller as seen through its session claims.
///
/// Built from an opened assertion without touching storage, so it reflects
/// grants as of when the assertion was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl Principal {
    pub fn from_claims(claims: &IdentityClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.name.clone(),
            roles: claims.roles.clone(),
            permissions: claims.permissions.clone(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission for '{0}'")]
    Forbidden(String),
}

/// Authorize a principal for a resource using its embedded permission claims.
///
/// - No IO
/// - No panics
/// - URI comparison is case-insensitive
pub fn authorize(principal: &Principal, resource_uri: &str) -> Result<(), AuthzError> {
    if principal.permissions.iter().any(|p| uri_eq(p, resource_uri)) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(resource_uri.to_string()))
    }
}

/// Outcome of an authorization check, for audit logging and debugging
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationExplanation {
    pub user_id: UserId,
    pub resource_uri: String,
    pub granted: bool,
    pub reason: String,
    pub roles: Vec<String>,
}

/// Explain why [`authorize`] would grant or deny `resource_uri`.
pub fn explain_authorization(principal: &Principal, resource_uri: &str) -> AuthorizationExplanation {
    let matched = principal.permissions.iter().find(|p| uri_eq(p, resource_uri));

    let (granted, reason) = match matched {
        Some(p) => (true, format!("session grants '{p}'")),
        None if principal.permissions.is_empty() => {
            (false, "session carries no permission claims".to_string())
        }
        None => (
            false,
            format!(
                "no permission claim matches '{}'; session grants {:?}",
                resource_uri, principal.permissions
            ),
        ),
    };

    AuthorizationExplanation {
        user_id: principal.user_id,
        resource_uri: resource_uri.to_string(),
        granted,
        reason,
        roles: principal.roles.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(perms: &[&str]) -> Principal {
        Principal {
            user_id: UserId::new(1),
            username: "alice".into(),
            roles: vec!["admin".into()],
            permissions: perms.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn authorize_matches_case_insensitively() {
        let p = principal(&["/Admin/Roles"]);
        assert_eq!(authorize(&p, "/admin/roles"), Ok(()));
    }

    #[test]
    fn authorize_denies_missing_uri() {
        let p = principal(&["/"]);
        assert_eq!(
            authorize(&p, "/users"),
            Err(AuthzError::Forbidden("/users".into()))
        );
    }

    #[test]
    fn explanation_reports_matching_claim() {
        let granted = explain_authorization(&principal(&["/users"]), "/USERS");
        assert!(granted.granted);
        assert!(granted.reason.contains("/users"));

        let denied = explain_authorization(&principal(&[]), "/users");
        assert!(!denied.granted);
        assert!(denied.reason.contains("no permission claims"));
    }

    #[test]
    fn from_claims_copies_grants() {
        let claims = IdentityClaims {
            sub: UserId::new(3),
            name: "bob".into(),
            email: String::new(),
            roles: vec!["standard user".into()],
            permissions: vec!["/".into()],
            iat: 0,
            exp: 10,
        };
        let p = Principal::from_claims(&claims);
        assert_eq!(p.user_id, UserId::new(3));
        assert!(p.has_role("standard user"));
        assert_eq!(authorize(&p, "/"), Ok(()));
    }
}
