//! Issuance and lookup of opaque bearer tokens.
//!
//! A token is 16 bytes from the operating system's CSPRNG, encoded as
//! unpadded base-32 (26 characters). Only the SHA-256 of that text is
//! persisted; the plaintext is handed back to the caller once.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::clock::Clock;
use crate::config::TokenConfig;
use crate::data::{Scope, Token, TokenHash, TokenRecord, UserId};
use crate::error::GateError;
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;
use crate::store::TokenStore;

/// Random bytes per token.
const TOKEN_ENTROPY_BYTES: usize = 16;

/// Builds a token from `rng` without touching any store.
pub fn generate_token<R: RngCore + ?Sized>(
    rng: &mut R,
    scope: Scope,
    user_id: UserId,
    ttl: Duration,
    now: SystemTime,
) -> Result<Token, GateError> {
    if ttl.is_zero() {
        return Err(GateError::invalid_field("ttl", "must be greater than zero"));
    }
    let expiry = now
        .checked_add(ttl)
        .ok_or_else(|| GateError::invalid_field("ttl", "is too large"))?;

    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    rng.try_fill_bytes(&mut bytes).map_err(GateError::Entropy)?;

    let plaintext = BASE32_NOPAD.encode(&bytes);
    let record = TokenRecord {
        hash: TokenHash::of(&plaintext),
        user_id,
        scope,
        expiry,
    };
    Ok(Token::new(plaintext, record))
}

pub struct TokenIssuer {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    ttls: TokenConfig,
    timeout: Duration,
}

impl TokenIssuer {
    pub fn new(
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        ttls: TokenConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            ttls,
            timeout,
        }
    }

    /// Configured lifetime for tokens of `scope`.
    pub fn ttl_for(&self, scope: Scope) -> Duration {
        self.ttls.ttl(scope)
    }

    /// A fresh token expiring `ttl` from now. Nothing is stored.
    pub fn generate(&self, scope: Scope, user_id: UserId, ttl: Duration) -> Result<Token, GateError> {
        generate_token(&mut OsRng, scope, user_id, ttl, self.clock.now())
    }

    /// Generates a token and persists its record.
    pub async fn issue(&self, scope: Scope, user_id: UserId, ttl: Duration) -> Result<Token, GateError> {
        let token = self.generate(scope, user_id, ttl)?;
        with_timeout(self.timeout, self.store.insert_token(token.record().clone())).await?;

        metrics::record_token_issued(scope.as_str());
        tracing::debug!(%scope, user_id, hash = ?token.hash(), "Token issued");
        Ok(token)
    }

    /// The active record for `plaintext` in `scope`, if any.
    pub async fn find(&self, scope: Scope, plaintext: &str) -> Result<Option<TokenRecord>, GateError> {
        let hash = TokenHash::of(plaintext);
        let now = self.clock.now();
        Ok(with_timeout(self.timeout, self.store.find_token(&hash, scope, now)).await?)
    }

    /// Deletes every token of `scope` owned by `user_id`.
    pub async fn revoke_all(&self, scope: Scope, user_id: UserId) -> Result<u64, GateError> {
        let removed =
            with_timeout(self.timeout, self.store.delete_all_for_user(scope, user_id)).await?;
        tracing::debug!(%scope, user_id, removed, "Tokens revoked");
        Ok(removed)
    }
}
