use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::UserId;

/// Claim set embedded in a session assertion (transport-agnostic).
///
/// Field names follow JWT registered claims where one exists so the sealed
/// form can be validated by standard JWT tooling. Timestamps are Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject: the user id.
    pub sub: UserId,

    /// Username at the time the assertion was built.
    pub name: String,

    /// Email address (empty when the account has none).
    pub email: String,

    /// One entry per role name.
    pub roles: Vec<String>,

    /// One entry per permission resource URI.
    pub permissions: Vec<String>,

    /// Issued-at (Unix seconds).
    pub iat: i64,

    /// Expiration (Unix seconds).
    pub exp: i64,
}

/// A single labeled fact about the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Claim {
    NameIdentifier(UserId),
    Name(String),
    Email(String),
    Role(String),
    Permission(String),
}

impl IdentityClaims {
    /// Flatten into individual claims: identity first, then roles, then permissions.
    pub fn claims(&self) -> Vec<Claim> {
        let mut out = Vec::with_capacity(3 + self.roles.len() + self.permissions.len());
        out.push(Claim::NameIdentifier(self.sub));
        out.push(Claim::Name(self.name.clone()));
        out.push(Claim::Email(self.email.clone()));
        out.extend(self.roles.iter().cloned().map(Claim::Role));
        out.extend(self.permissions.iter().cloned().map(Claim::Permission));
        out
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp(self.iat)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("assertion has expired")]
    Expired,

    #[error("assertion not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid assertion time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claim time window.
///
/// Signature checks happen in the codec; this only looks at `iat`/`exp`.
pub fn validate_claims(claims: &IdentityClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_at(now: DateTime<Utc>, ttl: Duration) -> IdentityClaims {
        IdentityClaims {
            sub: UserId::new(1),
            name: "alice".into(),
            email: String::new(),
            roles: vec!["admin".into()],
            permissions: vec!["/".into(), "/users".into()],
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    #[test]
    fn flattens_one_claim_per_role_and_permission() {
        let claims = claims_at(Utc::now(), Duration::hours(1));
        let flat = claims.claims();

        assert_eq!(flat.len(), 3 + 1 + 2);
        assert_eq!(flat[0], Claim::NameIdentifier(UserId::new(1)));
        assert!(flat.contains(&Claim::Role("admin".into())));
        assert!(flat.contains(&Claim::Permission("/users".into())));
    }

    #[test]
    fn window_checks() {
        let now = Utc::now();
        let claims = claims_at(now, Duration::hours(1));

        assert_eq!(validate_claims(&claims, now), Ok(()));
        assert_eq!(
            validate_claims(&claims, now + Duration::hours(2)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, now - Duration::minutes(5)),
            Err(TokenValidationError::NotYetValid)
        );

        let inverted = claims_at(now, Duration::hours(-1));
        assert_eq!(
            validate_claims(&inverted, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
