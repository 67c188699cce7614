//! Bearer tokens and their stored form.

use std::fmt;
use std::time::SystemTime;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use validator::ValidationError;

use crate::clock::unix_secs;
use crate::data::user::UserId;

/// Length of every plaintext token: 16 random bytes in unpadded base-32.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// Purpose class of a token. A token only satisfies lookups for its own scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    Activation,
    Authentication,
    PasswordReset,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
            Scope::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 of a plaintext token. This is what stores key on.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenHash([u8; 32]);

impl TokenHash {
    pub fn of(plaintext: &str) -> Self {
        Self(Sha256::digest(plaintext.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A short prefix is enough to correlate log lines.
        write!(f, "TokenHash(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// The persisted form of a token. Holds no plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub hash: TokenHash,
    pub user_id: UserId,
    pub scope: Scope,
    pub expiry: SystemTime,
}

impl TokenRecord {
    /// Resolvable only strictly before expiry.
    pub fn is_active_at(&self, now: SystemTime) -> bool {
        now < self.expiry
    }
}

/// A freshly issued token. The plaintext leaves the process exactly once, in
/// the response (or notification) that hands it to its owner.
#[derive(Clone)]
pub struct Token {
    plaintext: String,
    record: TokenRecord,
}

impl Token {
    pub(crate) fn new(plaintext: String, record: TokenRecord) -> Self {
        Self { plaintext, record }
    }

    pub fn plaintext(&self) -> &str {
        &self.plaintext
    }

    pub fn record(&self) -> &TokenRecord {
        &self.record
    }

    pub fn hash(&self) -> &TokenHash {
        &self.record.hash
    }

    pub fn user_id(&self) -> UserId {
        self.record.user_id
    }

    pub fn scope(&self) -> Scope {
        self.record.scope
    }

    pub fn expiry(&self) -> SystemTime {
        self.record.expiry
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("plaintext", &"<redacted>")
            .field("record", &self.record)
            .finish()
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Token", 2)?;
        state.serialize_field("token", &self.plaintext)?;
        state.serialize_field("expiry", &unix_secs(self.record.expiry))?;
        state.end()
    }
}

/// Shape check for a client-supplied plaintext, before any hashing or lookup.
/// Usable as a `validator` custom rule.
pub fn validate_plaintext(text: &str) -> Result<(), ValidationError> {
    if text.is_empty() {
        Err(ValidationError::new("required").with_message("must be provided".into()))
    } else if text.len() != TOKEN_PLAINTEXT_LEN {
        Err(ValidationError::new("length").with_message("must be 26 bytes long".into()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> Token {
        let plaintext = "ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string();
        let record = TokenRecord {
            hash: TokenHash::of(&plaintext),
            user_id: 7,
            scope: Scope::Authentication,
            expiry: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000),
        };
        Token::new(plaintext, record)
    }

    #[test]
    fn test_debug_redacts_plaintext() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_serializes_plaintext_and_expiry_only() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["token"], "ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(value["expiry"], 1_000);
        assert!(value.get("record").is_none());
        assert!(value.get("hash").is_none());
    }

    #[test]
    fn test_hash_is_sha256_of_plaintext() {
        let expected: [u8; 32] = Sha256::digest(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ").into();
        assert_eq!(sample().hash().as_bytes(), &expected);
    }

    #[test]
    fn test_active_strictly_before_expiry() {
        let token = sample();
        let expiry = token.expiry();
        assert!(token.record().is_active_at(expiry - Duration::from_secs(1)));
        assert!(!token.record().is_active_at(expiry));
    }

    #[test]
    fn test_validate_plaintext() {
        assert!(validate_plaintext("ABCDEFGHIJKLMNOPQRSTUVWXYZ").is_ok());
        let empty = validate_plaintext("").unwrap_err();
        assert_eq!(empty.message.as_deref(), Some("must be provided"));
        let short = validate_plaintext("short").unwrap_err();
        assert_eq!(short.message.as_deref(), Some("must be 26 bytes long"));
    }

    #[test]
    fn test_scope_wire_names() {
        assert_eq!(Scope::PasswordReset.as_str(), "password-reset");
        assert_eq!(
            serde_json::to_string(&Scope::PasswordReset).unwrap(),
            "\"password-reset\""
        );
    }
}
