//! `warden-auth`: users, roles, permissions, and session identity.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod assertion;
pub mod authorize;
pub mod claims;
pub mod error;
pub mod links;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod service;
pub mod user;

pub use assertion::{build_identity, AssertionCodec, AssertionError, Hs256AssertionCodec, SessionPolicy};
pub use authorize::{authorize, explain_authorization, AuthorizationExplanation, AuthzError, Principal};
pub use claims::{validate_claims, Claim, IdentityClaims, TokenValidationError};
pub use error::{AuthError, AuthResult};
pub use links::{RolePermission, UserRole};
pub use password::{hash_password, verify_password, PasswordHash};
pub use permissions::{uri_eq, NewPermission, Permission, PermissionDiff, PermissionType};
pub use roles::{NewRole, Role};
pub use service::{Authenticator, PermissionResolver, RbacAdmin};
pub use user::{NewUser, User, UserProfile};
