//! Optimistic concurrency control.
//!
//! # Data Flow
//! ```text
//! handler reads record at version v
//!     → mutates its copy
//!     → guard.rs submits (full state, v)
//!     → store performs one atomic conditional update on (id, v)
//!     → Applied(v + 1) | Missing → NotFound | Stale → EditConflict
//! ```
//!
//! # Design Decisions
//! - No application-level lock: correctness must hold across service instances
//! - The version is only ever bumped inside the store's atomic step
//! - Never retries; the caller re-fetches if it wants to try again

pub mod guard;

pub use guard::ConcurrencyGuard;
