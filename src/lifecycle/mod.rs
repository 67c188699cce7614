//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - One coordinator; the server and the signal task both hold it
//! - The limiter janitor is not cancelled; it ends with the runtime

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
