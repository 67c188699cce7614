//! Transport-level layers that sit outside the security gates.
//!
//! - `cors.rs`: answers preflights and tags responses for trusted origins
//! - `recover.rs`: turns a panicking handler into a 500 instead of a reset

pub mod cors;
pub mod recover;

pub use cors::build_cors_layer;
pub use recover::recover_panic;
