//! Bearer-token authentication.
//!
//! # Resolution
//! ```text
//! no Authorization header        → Principal::Anonymous
//! not exactly "Bearer <token>"   → InvalidToken
//! token not 26 bytes             → InvalidToken (no lookup)
//! no active authentication token → InvalidToken
//! owner gone                     → InvalidToken
//! otherwise                      → Principal::Authenticated(owner)
//! ```
//!
//! The gate only reads from the stores.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::data::{Scope, TOKEN_PLAINTEXT_LEN};
use crate::error::GateError;
use crate::resilience::timeouts::with_timeout;
use crate::security::principal::{set_principal, Principal};
use crate::security::tokens::TokenIssuer;
use crate::store::{StoreError, UserStore};

pub struct Authenticator {
    issuer: Arc<TokenIssuer>,
    users: Arc<dyn UserStore>,
    timeout: Duration,
}

impl Authenticator {
    pub fn new(issuer: Arc<TokenIssuer>, users: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self {
            issuer,
            users,
            timeout,
        }
    }

    /// Resolves the raw `Authorization` header value to a principal.
    pub async fn resolve(&self, header: Option<&str>) -> Result<Principal, GateError> {
        let header = match header {
            None | Some("") => return Ok(Principal::Anonymous),
            Some(value) => value,
        };

        let candidate = bearer_candidate(header).ok_or_else(|| {
            tracing::debug!("Malformed authorization header");
            GateError::InvalidToken
        })?;
        if candidate.len() != TOKEN_PLAINTEXT_LEN {
            tracing::debug!(len = candidate.len(), "Bearer token has wrong length");
            return Err(GateError::InvalidToken);
        }

        let record = self
            .issuer
            .find(Scope::Authentication, candidate)
            .await?
            .ok_or(GateError::InvalidToken)?;

        match with_timeout(self.timeout, self.users.get_user(record.user_id)).await {
            Ok(user) => Ok(Principal::Authenticated(Arc::new(user))),
            Err(StoreError::NotFound) => {
                tracing::debug!(user_id = record.user_id, "Token owner no longer exists");
                Err(GateError::InvalidToken)
            }
            Err(other) => Err(other.into()),
        }
    }
}

/// The token part of `Bearer <token>`. The scheme is matched literally and
/// the value must split on single spaces into exactly two parts.
fn bearer_candidate(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

/// Middleware attaching the caller's [`Principal`] to the request.
pub async fn authenticate(
    State(authenticator): State<Arc<Authenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let raw = match request.headers().get(header::AUTHORIZATION) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.to_owned()))
            .map_err(|_| GateError::InvalidToken),
    };

    let outcome = match raw {
        Ok(value) => authenticator.resolve(value.as_deref()).await,
        Err(err) => Err(err),
    };

    let mut response = match outcome {
        Ok(principal) => {
            set_principal(&mut request, principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
