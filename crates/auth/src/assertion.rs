//! Identity assertions: building, sealing, and sliding renewal.
//!
//! An assertion is the [`IdentityClaims`] record sealed into an opaque string
//! that a session transport (cookie, header) carries between requests. Opening
//! it again needs no storage access.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{validate_claims, IdentityClaims, TokenValidationError};
use crate::{Permission, Role, User};

// ─────────────────────────────────────────────────────────────────────────────
// Session policy
// ─────────────────────────────────────────────────────────────────────────────

/// Lifetime rules for issued assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub ttl: Duration,
    /// Re-issue assertions that are past half their lifetime.
    pub sliding: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            sliding: true,
        }
    }
}

impl SessionPolicy {
    /// `now + ttl`, clamped to the latest representable instant.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether a still-valid assertion should be re-issued with a fresh window.
    pub fn should_renew(&self, claims: &IdentityClaims, now: DateTime<Utc>) -> bool {
        if !self.sliding {
            return false;
        }
        let now = now.timestamp();
        let lifetime = claims.exp - claims.iat;
        now < claims.exp && now - claims.iat > lifetime / 2
    }

    /// Same claims, new `iat`/`exp`.
    pub fn renew(&self, claims: &IdentityClaims, now: DateTime<Utc>) -> IdentityClaims {
        IdentityClaims {
            iat: now.timestamp(),
            exp: self.expires_at(now).timestamp(),
            ..claims.clone()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Build the claim set for `user` from already-resolved roles and permissions.
///
/// Permission claims carry resource URIs only, one per distinct URI, in the
/// order the permissions were given.
pub fn build_identity(
    user: &User,
    roles: &[Role],
    permissions: &[Permission],
    policy: &SessionPolicy,
    now: DateTime<Utc>,
) -> IdentityClaims {
    let mut uris: Vec<String> = Vec::with_capacity(permissions.len());
    for p in permissions {
        if !uris.iter().any(|u| u == &p.resource_uri) {
            uris.push(p.resource_uri.clone());
        }
    }

    IdentityClaims {
        sub: user.id,
        name: user.username.clone(),
        email: user.email.clone(),
        roles: roles.iter().map(|r| r.name.clone()).collect(),
        permissions: uris,
        iat: now.timestamp(),
        exp: policy.expires_at(now).timestamp(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssertionError {
    /// Bad signature, wrong algorithm, or malformed payload.
    #[error("invalid assertion: {0}")]
    Invalid(String),

    #[error("assertion has expired")]
    Expired,

    #[error("assertion not yet valid")]
    NotYetValid,

    #[error("failed to seal assertion: {0}")]
    Encoding(String),
}

impl From<TokenValidationError> for AssertionError {
    fn from(value: TokenValidationError) -> Self {
        match value {
            TokenValidationError::Expired => AssertionError::Expired,
            TokenValidationError::NotYetValid => AssertionError::NotYetValid,
            TokenValidationError::InvalidTimeWindow => AssertionError::Invalid(value.to_string()),
        }
    }
}

/// Seals claim sets into opaque strings and opens them again.
pub trait AssertionCodec: Send + Sync {
    fn seal(&self, claims: &IdentityClaims) -> Result<String, AssertionError>;

    /// Verify integrity and the time window at `now`, then return the claims.
    fn open(&self, sealed: &str, now: DateTime<Utc>) -> Result<IdentityClaims, AssertionError>;
}

/// HMAC-SHA256 signed JWT codec.
pub struct Hs256AssertionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256AssertionCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks go through `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

impl AssertionCodec for Hs256AssertionCodec {
    fn seal(&self, claims: &IdentityClaims) -> Result<String, AssertionError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AssertionError::Encoding(e.to_string()))
    }

    fn open(&self, sealed: &str, now: DateTime<Utc>) -> Result<IdentityClaims, AssertionError> {
        let data = jsonwebtoken::decode::<IdentityClaims>(sealed, &self.decoding, &Self::validation())
            .map_err(|e| AssertionError::Invalid(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{password::hash_password, NewPermission, NewRole, NewUser, PermissionType};
    use warden_core::{PermissionId, RoleId, UserId};

    fn alice() -> User {
        let mut user = NewUser::active("alice", hash_password("p@ss1"), Utc::now()).into_user(UserId::new(7));
        user.email = "alice@example.com".into();
        user
    }

    fn grants() -> (Vec<Role>, Vec<Permission>) {
        let roles = vec![NewRole::new("admin", "").into_role(RoleId::new(1))];
        let permissions = vec![
            NewPermission::new("home", "/", PermissionType::Page).into_permission(PermissionId::new(1)),
            NewPermission::new("users", "/users", PermissionType::Page).into_permission(PermissionId::new(2)),
            NewPermission::new("users api", "/users", PermissionType::Api).into_permission(PermissionId::new(3)),
        ];
        (roles, permissions)
    }

    #[test]
    fn builds_identity_claims() {
        let now = Utc::now();
        let (roles, permissions) = grants();
        let claims = build_identity(&alice(), &roles, &permissions, &SessionPolicy::default(), now);

        assert_eq!(claims.sub, UserId::new(7));
        assert_eq!(claims.name, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.roles, vec!["admin"]);
        assert_eq!(claims.permissions, vec!["/", "/users"]);
        assert_eq!(claims.exp - claims.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn seal_then_open_is_lossless() {
        let now = Utc::now();
        let (roles, permissions) = grants();
        let claims = build_identity(&alice(), &roles, &permissions, &SessionPolicy::default(), now);
        let codec = Hs256AssertionCodec::new("test-secret");

        let sealed = codec.seal(&claims).unwrap();
        assert_eq!(codec.open(&sealed, now).unwrap(), claims);
    }

    #[test]
    fn tampered_assertion_is_rejected() {
        let now = Utc::now();
        let claims = build_identity(&alice(), &[], &[], &SessionPolicy::default(), now);
        let codec = Hs256AssertionCodec::new("test-secret");
        let sealed = codec.seal(&claims).unwrap();

        // Forge a payload that grants more than was issued, keep the old signature.
        let mut forged = claims.clone();
        forged.permissions.push("/admin/roles".into());
        let forged_sealed = Hs256AssertionCodec::new("attacker").seal(&forged).unwrap();
        let mut parts: Vec<&str> = forged_sealed.split('.').collect();
        let original_sig = sealed.rsplit('.').next().unwrap();
        parts[2] = original_sig;
        let spliced = parts.join(".");

        assert!(matches!(codec.open(&spliced, now), Err(AssertionError::Invalid(_))));
        assert!(matches!(
            Hs256AssertionCodec::new("other-secret").open(&sealed, now),
            Err(AssertionError::Invalid(_))
        ));
        assert!(matches!(codec.open("not-a-token", now), Err(AssertionError::Invalid(_))));
    }

    #[test]
    fn expired_assertion_is_rejected() {
        let now = Utc::now();
        let claims = build_identity(&alice(), &[], &[], &SessionPolicy::default(), now);
        let codec = Hs256AssertionCodec::new("test-secret");
        let sealed = codec.seal(&claims).unwrap();

        assert_eq!(
            codec.open(&sealed, now + Duration::days(8)),
            Err(AssertionError::Expired)
        );
    }

    #[test]
    fn sliding_renewal_after_half_lifetime() {
        let now = Utc::now();
        let policy = SessionPolicy::default();
        let claims = build_identity(&alice(), &[], &[], &policy, now);

        assert!(!policy.should_renew(&claims, now + Duration::days(3)));
        assert!(policy.should_renew(&claims, now + Duration::days(4)));
        assert!(!policy.should_renew(&claims, now + Duration::days(8)));

        let later = now + Duration::days(4);
        let renewed = policy.renew(&claims, later);
        assert_eq!(renewed.iat, later.timestamp());
        assert_eq!(renewed.exp, (later + Duration::days(7)).timestamp());
        assert_eq!(renewed.permissions, claims.permissions);

        let fixed = SessionPolicy { sliding: false, ..policy };
        assert!(!fixed.should_renew(&claims, now + Duration::days(6)));
    }

    #[test]
    fn oversized_ttl_saturates_instead_of_overflowing() {
        let now = Utc::now();
        let policy = SessionPolicy {
            ttl: Duration::seconds(100_000_000_000_000),
            sliding: true,
        };
        assert_eq!(policy.expires_at(now), DateTime::<Utc>::MAX_UTC);

        let claims = build_identity(&alice(), &[], &[], &policy, now);
        assert!(claims.exp > claims.iat);
        assert_eq!(policy.renew(&claims, now).exp, claims.exp);
    }
}
