//! The resolved caller of a request.
//!
//! The authentication stage stores a [`Principal`] in the request
//! extensions; everything downstream reads it from there. A request that
//! never passed through that stage has no principal at all, which is a
//! wiring mistake and surfaces as `GateError::MissingPrincipal`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::Request;

use crate::data::User;
use crate::error::GateError;

#[derive(Debug, Clone)]
pub enum Principal {
    /// No credentials were presented.
    Anonymous,
    Authenticated(Arc<User>),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::Authenticated(user) => Some(user),
        }
    }
}

pub fn set_principal<B>(request: &mut Request<B>, principal: Principal) {
    request.extensions_mut().insert(principal);
}

pub fn principal_from<B>(request: &Request<B>) -> Result<Principal, GateError> {
    request
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or(GateError::MissingPrincipal)
}

/// Extractor for handlers behind the authentication stage.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or(GateError::MissingPrincipal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_missing_principal_is_an_error() {
        let request = Request::new(Body::empty());
        assert!(matches!(
            principal_from(&request),
            Err(GateError::MissingPrincipal)
        ));
    }

    #[test]
    fn test_set_then_read() {
        let mut request = Request::new(Body::empty());
        set_principal(&mut request, Principal::Anonymous);
        let principal = principal_from(&request).unwrap();
        assert!(principal.is_anonymous());
        assert!(principal.user().is_none());
    }

    #[tokio::test]
    async fn test_extractor_rejects_request_without_principal() {
        let (mut parts, _) = Request::new(Body::empty()).into_parts();
        let rejection = CurrentPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(rejection, GateError::MissingPrincipal));

        let response = axum::response::IntoResponse::into_response(rejection);
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_extractor_reads_principal() {
        let mut request = Request::new(Body::empty());
        set_principal(&mut request, Principal::Anonymous);
        let (mut parts, _) = request.into_parts();
        let CurrentPrincipal(principal) = CurrentPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(principal.is_anonymous());
    }
}
