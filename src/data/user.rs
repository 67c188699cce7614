//! User accounts.

use std::fmt;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Serialize;

use crate::data::version::{Version, Versioned};
use crate::error::GateError;

pub type UserId = i64;

/// Upper bound on accepted plaintext passwords.
pub const MAX_PASSWORD_LEN: usize = 72;

/// Argon2id PHC string of a user's password.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Hashes a plaintext password with a random salt.
    pub fn from_plaintext(password: &str) -> Result<Self, GateError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| GateError::Internal(format!("password hashing failed: {e}")))?;
        Ok(Self(hash.to_string()))
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored digest is unusable.
    pub fn matches(&self, password: &str) -> Result<bool, GateError> {
        let parsed = PasswordHash::new(&self.0)
            .map_err(|e| GateError::Internal(format!("invalid password digest: {e}")))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(GateError::Internal(format!(
                "password verification failed: {e}"
            ))),
        }
    }
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(<redacted>)")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub password: PasswordDigest,
    pub activated: bool,
    #[serde(skip)]
    pub version: Version,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
}

impl Versioned for User {
    const KIND: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}

/// A user not yet assigned an id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: PasswordDigest,
    pub activated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let digest = PasswordDigest::from_plaintext("pa55word").unwrap();
        assert!(digest.matches("pa55word").unwrap());
        assert!(!digest.matches("wrong-password").unwrap());
    }

    #[test]
    fn test_digest_debug_is_redacted() {
        let digest = PasswordDigest::from_plaintext("pa55word").unwrap();
        assert_eq!(format!("{digest:?}"), "PasswordDigest(<redacted>)");
    }
}
