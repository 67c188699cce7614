//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every store call made on behalf of a request
//! - Turn an elapsed deadline into a distinct `StoreError::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the future is the only
//!   cancellation the gates perform
//! - A timed-out lookup fails the request as an internal error, it never
//!   blocks indefinitely

use std::future::Future;
use std::time::Duration;

use crate::store::StoreError;

/// Runs a store call with a deadline.
pub async fn with_timeout<F, T>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout = ?limit, "Store call timed out");
            Err(StoreError::Timeout(limit))
        }
    }
}
