use serde::{Deserialize, Serialize};

use warden_auth::{AuthorizationExplanation, Claim, IdentityClaims, PermissionType, UserProfile};
use warden_core::{PermissionId, RoleId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub password: String,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    pub role_ids: Vec<RoleId>,
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionsRequest {
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub resource: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    #[serde(flatten)]
    pub identity: IdentityClaims,
    pub claims: Vec<Claim>,
}

impl From<IdentityClaims> for IdentityResponse {
    fn from(identity: IdentityClaims) -> Self {
        let claims = identity.claims();
        Self { identity, claims }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub resource: String,
    #[serde(rename = "type")]
    pub kind: PermissionType,
    /// Fresh answer from current grants.
    pub granted: bool,
    /// What the session's embedded claims say.
    pub session: AuthorizationExplanation,
}
