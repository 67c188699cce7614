//! Classified outcomes of the gatekeeping layer.
//!
//! Every rejection the gates can produce is a variant of [`GateError`]. The
//! core never writes a response body itself; the transport layer turns a
//! `GateError` into a response through its [`IntoResponse`] impl.
//!
//! # Logging
//! Only infrastructure failures (`Entropy`, `Internal`, `MissingPrincipal`)
//! are logged at `error` level. Every other variant is a routine gatekeeping
//! decision and is only counted in metrics.

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::observability::metrics;
use crate::store::StoreError;

/// Field name → message, the body of a `422 Unprocessable Entity`.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("request failed validation")]
    Validation(FieldErrors),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("invalid or missing authentication token")]
    InvalidToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    Forbidden,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("secure random source failed: {0}")]
    Entropy(#[source] rand::Error),

    /// A handler read the principal before the authentication stage ran.
    #[error("principal missing from request context")]
    MissingPrincipal,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), message.into());
        GateError::Validation(fields)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GateError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GateError::NotFound => StatusCode::NOT_FOUND,
            GateError::EditConflict => StatusCode::CONFLICT,
            GateError::InvalidCredentials
            | GateError::InvalidToken
            | GateError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            GateError::Forbidden | GateError::InactiveAccount => StatusCode::FORBIDDEN,
            GateError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GateError::Entropy(_) | GateError::MissingPrincipal | GateError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True for failures of the service itself rather than of the caller.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            GateError::Entropy(_) | GateError::MissingPrincipal | GateError::Internal(_)
        )
    }

    /// Metric label for this outcome.
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::Validation(_) => "validation",
            GateError::BadRequest(_) => "bad_request",
            GateError::NotFound => "not_found",
            GateError::EditConflict => "edit_conflict",
            GateError::InvalidCredentials => "invalid_credentials",
            GateError::InvalidToken => "invalid_token",
            GateError::AuthenticationRequired => "authentication_required",
            GateError::Forbidden => "forbidden",
            GateError::InactiveAccount => "inactive_account",
            GateError::RateLimited => "rate_limited",
            GateError::Entropy(_) => "entropy",
            GateError::MissingPrincipal => "missing_principal",
            GateError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => GateError::NotFound,
            StoreError::DuplicateEmail => {
                GateError::invalid_field("email", "a user with this email address already exists")
            }
            other => GateError::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for GateError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errs)| {
                errs.first().map(|e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    (field.to_string(), message)
                })
            })
            .collect();
        GateError::Validation(fields)
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::record_rejection(self.reason());

        let body = match &self {
            GateError::Validation(fields) => json!({ "error": fields }),
            err if err.is_internal() => {
                // Runs inside the request's trace span, which carries method and URI.
                tracing::error!(error = %err, "request failed");
                json!({ "error": "the server encountered a problem and could not process your request" })
            }
            err => json!({ "error": err.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, GateError::InvalidToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GateError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GateError::AuthenticationRequired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GateError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(GateError::InactiveAccount.status(), StatusCode::FORBIDDEN);
        assert_eq!(GateError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(GateError::EditConflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            GateError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_invalid_token_sets_challenge_header() {
        let response = GateError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_store_errors_classified() {
        assert!(matches!(GateError::from(StoreError::NotFound), GateError::NotFound));
        assert!(matches!(
            GateError::from(StoreError::DuplicateEmail),
            GateError::Validation(ref f) if f.contains_key("email")
        ));
        assert!(GateError::from(StoreError::VersionOverflow).is_internal());
    }
}
