//! Endpoint handlers.
//!
//! Handlers are thin: decode and validate the body, call the stores and the
//! token issuer, and let `GateError` shape every failure.

pub mod health;
pub mod movies;
pub mod tokens;
pub mod users;
