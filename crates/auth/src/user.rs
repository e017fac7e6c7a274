//! User accounts.
//!
//! Accounts are plain records: role membership lives in the user-role join
//! table, never on the user itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{require_non_blank, DomainResult, Entity, UserId};

use crate::password::PasswordHash;

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A login account.
///
/// # Invariants
/// - `username` is unique across all users (case-sensitive).
/// - Inactive users cannot authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn can_authenticate(&self) -> bool {
        self.is_active
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// A user about to be inserted (id assigned by the store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password_hash: PasswordHash,
    pub email: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    /// Active account with no email, as created by self-registration.
    pub fn active(username: impl Into<String>, password_hash: PasswordHash, created_at: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            password_hash,
            email: String::new(),
            is_active: true,
            created_at,
        }
    }

    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            username: self.username,
            password_hash: self.password_hash,
            email: self.email,
            is_active: self.is_active,
            created_at: self.created_at,
            last_login: None,
        }
    }
}

/// Administrator-supplied account details (no password).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl UserProfile {
    pub fn validate(&self) -> DomainResult<()> {
        require_non_blank("username", &self.username)
    }
}
