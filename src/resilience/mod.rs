//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Store call from a gate or handler:
//!     → timeouts.rs (enforce the configured query deadline)
//!     → On elapse: StoreError::Timeout → 500 to the caller
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every store call has a deadline
//! - No automatic retries anywhere in the gatekeeping layer

pub mod timeouts;
