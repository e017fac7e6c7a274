use warden_auth::{IdentityClaims, Principal};
use warden_core::UserId;

/// Session context for a request (opened assertion + derived principal).
///
/// Inserted by the session middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    claims: IdentityClaims,
    principal: Principal,
}

impl SessionContext {
    pub fn new(claims: IdentityClaims) -> Self {
        let principal = Principal::from_claims(&claims);
        Self { claims, principal }
    }

    pub fn user_id(&self) -> UserId {
        self.claims.sub
    }

    pub fn claims(&self) -> &IdentityClaims {
        &self.claims
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
