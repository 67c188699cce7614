//! Authorization gates.
//!
//! Each stage implies the ones before it:
//! ```text
//! require_authenticated  → AuthenticationRequired if anonymous
//! require_activated      → InactiveAccount if not activated
//! require_permission(c)  → Forbidden unless the caller holds code `c`
//! ```
//!
//! The checks are plain functions over a [`Principal`]; the middleware
//! variants read the principal left by the authentication stage.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::data::User;
use crate::error::GateError;
use crate::resilience::timeouts::with_timeout;
use crate::security::principal::{principal_from, Principal};
use crate::store::PermissionStore;

pub fn check_authenticated(principal: &Principal) -> Result<&User, GateError> {
    principal.user().ok_or(GateError::AuthenticationRequired)
}

pub fn check_activated(principal: &Principal) -> Result<&User, GateError> {
    let user = check_authenticated(principal)?;
    if user.activated {
        Ok(user)
    } else {
        Err(GateError::InactiveAccount)
    }
}

/// Looks up grants in the permission store.
pub struct Authorizer {
    permissions: Arc<dyn PermissionStore>,
    timeout: Duration,
}

impl Authorizer {
    pub fn new(permissions: Arc<dyn PermissionStore>, timeout: Duration) -> Self {
        Self {
            permissions,
            timeout,
        }
    }

    /// Codes are opaque and compared exactly.
    pub async fn check_permission(&self, principal: &Principal, code: &str) -> Result<(), GateError> {
        let user = check_activated(principal)?;
        let granted =
            with_timeout(self.timeout, self.permissions.get_all_for_user(user.id)).await?;
        if granted.include(code) {
            Ok(())
        } else {
            tracing::debug!(user_id = user.id, code, "Permission denied");
            Err(GateError::Forbidden)
        }
    }
}

/// State for [`require_permission`].
#[derive(Clone)]
pub struct RequirePermission {
    pub authorizer: Arc<Authorizer>,
    pub code: &'static str,
}

impl RequirePermission {
    pub fn new(authorizer: Arc<Authorizer>, code: &'static str) -> Self {
        Self { authorizer, code }
    }
}

pub async fn require_authenticated(request: Request<Body>, next: Next) -> Response {
    let checked = principal_from(&request).and_then(|p| check_authenticated(&p).map(|_| ()));
    match checked {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

pub async fn require_activated(request: Request<Body>, next: Next) -> Response {
    let checked = principal_from(&request).and_then(|p| check_activated(&p).map(|_| ()));
    match checked {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

pub async fn require_permission(
    State(gate): State<RequirePermission>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match principal_from(&request) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };
    match gate.authorizer.check_permission(&principal, gate.code).await {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::data::{NewUser, PasswordDigest, Permissions, UserId, MOVIES_READ, MOVIES_WRITE};
    use crate::security::principal::set_principal;
    use crate::store::{MemoryStore, StoreError, UserStore};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    async fn principal(store: &MemoryStore, email: &str, activated: bool) -> Principal {
        let user = store
            .insert_user(NewUser {
                email: email.into(),
                name: "Alice".into(),
                password: PasswordDigest::from_plaintext("pa55word").unwrap(),
                activated,
            })
            .await
            .unwrap();
        Principal::Authenticated(Arc::new(user))
    }

    fn memory() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(Arc::new(ManualClock::default())))
    }

    #[tokio::test]
    async fn test_anonymous_rejected_at_every_stage() {
        let store = memory();
        let authorizer = Authorizer::new(store, Duration::from_secs(3));
        let anonymous = Principal::Anonymous;

        assert!(matches!(
            check_authenticated(&anonymous),
            Err(GateError::AuthenticationRequired)
        ));
        assert!(matches!(
            check_activated(&anonymous),
            Err(GateError::AuthenticationRequired)
        ));
        assert!(matches!(
            authorizer.check_permission(&anonymous, MOVIES_READ).await,
            Err(GateError::AuthenticationRequired)
        ));
    }

    #[tokio::test]
    async fn test_inactive_user_rejected_before_permission_lookup() {
        let store = memory();
        let inactive = principal(&store, "a@example.com", false).await;
        store
            .add_for_user(inactive.user().unwrap().id, &[MOVIES_READ])
            .await
            .unwrap();
        let authorizer = Authorizer::new(store, Duration::from_secs(3));

        assert!(check_authenticated(&inactive).is_ok());
        assert!(matches!(check_activated(&inactive), Err(GateError::InactiveAccount)));
        assert!(matches!(
            authorizer.check_permission(&inactive, MOVIES_READ).await,
            Err(GateError::InactiveAccount)
        ));
    }

    #[tokio::test]
    async fn test_permission_membership_is_exact() {
        let store = memory();
        let active = principal(&store, "a@example.com", true).await;
        store
            .add_for_user(active.user().unwrap().id, &[MOVIES_READ])
            .await
            .unwrap();
        let authorizer = Authorizer::new(store, Duration::from_secs(3));

        assert!(authorizer.check_permission(&active, MOVIES_READ).await.is_ok());
        assert!(matches!(
            authorizer.check_permission(&active, MOVIES_WRITE).await,
            Err(GateError::Forbidden)
        ));
        assert!(matches!(
            authorizer.check_permission(&active, "Movies:Read").await,
            Err(GateError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_no_grants_is_forbidden_not_an_error() {
        let store = memory();
        let active = principal(&store, "a@example.com", true).await;
        let authorizer = Authorizer::new(store, Duration::from_secs(3));
        assert!(matches!(
            authorizer.check_permission(&active, MOVIES_READ).await,
            Err(GateError::Forbidden)
        ));
    }

    struct StalledPermissions;

    #[async_trait]
    impl PermissionStore for StalledPermissions {
        async fn get_all_for_user(&self, _user_id: UserId) -> Result<Permissions, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Permissions::new())
        }

        async fn add_for_user(&self, _user_id: UserId, _codes: &[&str]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_fails_internal() {
        let store = memory();
        let active = principal(&store, "a@example.com", true).await;
        let authorizer = Authorizer::new(Arc::new(StalledPermissions), Duration::from_secs(3));

        let err = authorizer.check_permission(&active, MOVIES_READ).await.unwrap_err();
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn test_middleware_without_authentication_stage_is_internal() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn(require_authenticated));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_permission_middleware_statuses() {
        let store = memory();
        let reader = principal(&store, "reader@example.com", true).await;
        store
            .add_for_user(reader.user().unwrap().id, &[MOVIES_READ])
            .await
            .unwrap();
        let authorizer = Arc::new(Authorizer::new(store, Duration::from_secs(3)));

        let app = |who: Principal| {
            Router::new()
                .route("/", get(|| async { "ok" }))
                .layer(from_fn_with_state(
                    RequirePermission::new(authorizer.clone(), MOVIES_WRITE),
                    require_permission,
                ))
                .layer(from_fn(move |mut request: Request<Body>, next: Next| {
                    let who = who.clone();
                    async move {
                        set_principal(&mut request, who);
                        next.run(request).await
                    }
                }))
        };

        let response = app(Principal::Anonymous)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(reader)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
