//! Request gatekeeping for an HTTP service: per-client rate limiting,
//! bearer-token authentication, permission authorization and optimistic
//! concurrency control on record updates.

// Domain
pub mod clock;
pub mod data;
pub mod error;
pub mod notify;
pub mod store;

// Gates
pub mod concurrency;
pub mod security;

// Transport
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatekeeperConfig;
pub use error::GateError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
