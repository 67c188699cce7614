//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack, graceful shutdown)
//!     → middleware/ (panic recovery, CORS)
//!     → security gates (rate limit, authentication, per-route permission)
//!     → extract.rs (JSON body + validation rules)
//!     → handlers/ (stores, token issuer, concurrency guard)
//!     → GateError → JSON error body
//! ```

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{AppState, HttpServer};
