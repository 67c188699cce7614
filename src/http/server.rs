//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (metrics, panic recovery, request ID, tracing,
//!   timeout, CORS, rate limit, authentication)
//! - Attach per-route authorization gates
//! - Bind server to listener, drain requests and token deliveries on shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::clock::Clock;
use crate::concurrency::ConcurrencyGuard;
use crate::config::GatekeeperConfig;
use crate::data::{MOVIES_READ, MOVIES_WRITE};
use crate::error::GateError;
use crate::http::handlers::{health, movies, tokens, users};
use crate::http::middleware::{build_cors_layer, recover_panic};
use crate::lifecycle::Shutdown;
use crate::notify::{Deliveries, TokenNotifier};
use crate::observability::metrics;
use crate::resilience::timeouts::with_timeout;
use crate::security::access_control::{require_permission, Authorizer, RequirePermission};
use crate::security::authenticate::{authenticate, Authenticator};
use crate::security::rate_limit::{rate_limit, RateLimiter};
use crate::security::tokens::TokenIssuer;
use crate::store::{StoreError, Stores};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatekeeperConfig>,
    pub stores: Stores,
    pub issuer: Arc<TokenIssuer>,
    pub authenticator: Arc<Authenticator>,
    pub authorizer: Arc<Authorizer>,
    pub limiter: Arc<RateLimiter>,
    pub guard: ConcurrencyGuard,
    pub deliveries: Deliveries,
}

impl AppState {
    pub fn new(
        config: GatekeeperConfig,
        stores: Stores,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn TokenNotifier>,
    ) -> Self {
        let timeout = config.store.query_timeout();
        let issuer = Arc::new(TokenIssuer::new(
            stores.tokens.clone(),
            clock,
            config.tokens.clone(),
            timeout,
        ));
        let authenticator = Arc::new(Authenticator::new(
            issuer.clone(),
            stores.users.clone(),
            timeout,
        ));
        let authorizer = Arc::new(Authorizer::new(stores.permissions.clone(), timeout));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Self {
            config: Arc::new(config),
            stores,
            issuer,
            authenticator,
            authorizer,
            limiter,
            guard: ConcurrencyGuard::new(timeout),
            deliveries: Deliveries::new(notifier),
        }
    }

    /// Runs a store call under the configured deadline.
    pub async fn store_call<T, F>(&self, call: F) -> Result<T, GateError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        Ok(with_timeout(self.config.store.query_timeout(), call).await?)
    }

    fn permission(&self, code: &'static str) -> RequirePermission {
        RequirePermission::new(self.authorizer.clone(), code)
    }
}

/// HTTP server for the gatekeeper.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(
        config: GatekeeperConfig,
        stores: Stores,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn TokenNotifier>,
    ) -> Self {
        let state = AppState::new(config, stores, clock, notifier);
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers wrap outward, so a request passes metrics, panic recovery,
    /// request ID, trace, timeout, CORS, rate limit and authentication before
    /// reaching a route's own permission gate. Preflights are answered by the
    /// CORS layer and never reach the gates.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let read = from_fn_with_state(state.permission(MOVIES_READ), require_permission);
        let write = from_fn_with_state(state.permission(MOVIES_WRITE), require_permission);

        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

        let router = Router::new()
            .route("/v1/healthcheck", get(health::healthcheck))
            .route("/v1/users", post(users::register))
            .route("/v1/users/activated", put(users::activate))
            .route("/v1/users/password", put(users::reset_password))
            .route(
                "/v1/tokens/authentication",
                post(tokens::create_authentication_token),
            )
            .route("/v1/tokens/activation", post(tokens::create_activation_token))
            .route(
                "/v1/tokens/password-reset",
                post(tokens::create_password_reset_token),
            )
            .route(
                "/v1/movies",
                post(movies::create_movie.layer(write.clone())),
            )
            .route(
                "/v1/movies/{id}",
                get(movies::show_movie.layer(read))
                    .put(movies::update_movie.layer(write.clone()))
                    .delete(movies::delete_movie.layer(write)),
            )
            .layer(from_fn_with_state(state.authenticator.clone(), authenticate))
            .layer(from_fn_with_state(state.limiter.clone(), rate_limit));

        let router = match build_cors_layer(&state.config.cors) {
            Some(cors) => router.layer(cors),
            None => router,
        };

        router
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(CatchPanicLayer::custom(recover_panic))
            .layer(from_fn(metrics::track_requests))
            .with_state(state)
    }

    /// Serve until `shutdown` is triggered, then drain in-flight requests and
    /// pending token deliveries.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = self.state.config.environment.as_str(),
            limiter_enabled = self.state.limiter.is_enabled(),
            cors_origins = self.state.config.cors.trusted_origins.len(),
            "HTTP server starting"
        );

        if self.state.limiter.is_enabled() {
            self.state.limiter.spawn_janitor();
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        let pending = self.state.deliveries.pending();
        tracing::info!(pending, "Completing background deliveries");
        if !self
            .state
            .deliveries
            .drain(self.state.config.timeouts.shutdown_drain())
            .await
        {
            tracing::warn!(
                abandoned = self.state.deliveries.pending(),
                "Shutdown deadline passed with deliveries still running"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
