//! Version-checked record updates.

use std::time::Duration;

use crate::data::Versioned;
use crate::error::GateError;
use crate::resilience::timeouts::with_timeout;
use crate::store::{CasOutcome, VersionedStore};

/// Applies record mutations through the store's conditional update.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyGuard {
    timeout: Duration,
}

impl ConcurrencyGuard {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Submits `record` (full desired state plus the version it was read at).
    ///
    /// On success `record.version()` is the newly stored version. A record
    /// deleted since it was read yields `NotFound`; a lost race yields
    /// `EditConflict`. Neither mutates the stored record.
    pub async fn update<R, S>(&self, store: &S, record: &mut R) -> Result<(), GateError>
    where
        R: Versioned,
        S: VersionedStore<R> + ?Sized,
    {
        let submitted = record.version();
        match with_timeout(self.timeout, store.compare_and_swap(record)).await? {
            CasOutcome::Applied(version) => {
                record.set_version(version);
                Ok(())
            }
            CasOutcome::Missing => {
                tracing::debug!(kind = R::KIND, id = record.id(), "Update target no longer exists");
                Err(GateError::NotFound)
            }
            CasOutcome::Stale { current } => {
                tracing::debug!(
                    kind = R::KIND,
                    id = record.id(),
                    submitted = %submitted,
                    current = %current,
                    "Edit conflict"
                );
                Err(GateError::EditConflict)
            }
        }
    }
}
