//! Password digests.
//!
//! Stored hashes are `base64(SHA-256(utf8(password)))` with no per-user salt.
//! The format is fixed by existing stored data; moving to a salted KDF needs a
//! migration path that re-hashes on next successful login.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stored one-way digest of a password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a digest loaded from storage.
    pub fn from_stored(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(<redacted>)")
    }
}

/// Digest a plaintext password.
pub fn hash_password(password: &str) -> PasswordHash {
    let digest = Sha256::digest(password.as_bytes());
    PasswordHash(STANDARD.encode(digest))
}

/// Check a plaintext password against a stored digest.
pub fn verify_password(password: &str, stored: &PasswordHash) -> bool {
    hash_password(password) == *stored
}
