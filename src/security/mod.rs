//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP token bucket)
//!     → authenticate.rs (Authorization header → Principal)
//!     → access_control.rs (per route: authenticated / activated / permission)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Gates only read from the stores; token issuance lives in tokens.rs
//! - No trust in client input

pub mod access_control;
pub mod authenticate;
pub mod principal;
pub mod rate_limit;
pub mod tokens;

pub use access_control::{Authorizer, RequirePermission};
pub use authenticate::Authenticator;
pub use principal::{CurrentPrincipal, Principal};
pub use rate_limit::RateLimiter;
pub use tokens::TokenIssuer;
